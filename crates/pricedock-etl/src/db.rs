use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::Result;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = pool_options(config).connect(&config.url).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Build a pool without connecting.
///
/// Only the URL is validated here; an unreachable server surfaces on the
/// first query.
pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = pool_options(config).connect_lazy(&config.url)?;
    tracing::debug!(max_connections = config.max_connections, "Lazy database pool created");
    Ok(pool)
}

/// Apply the bundled star-schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
