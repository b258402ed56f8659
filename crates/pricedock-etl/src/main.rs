//! Pricedock ETL - price catalog loader

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricedock_common::logging::{init_logging, LogConfig, LogLevel};
use pricedock_etl::config::EtlConfig;
use pricedock_etl::feed::{
    DirectoryFeedLocator, FeedLocator, Fetcher, HtmlListingLocator, HttpFetcher, LocalFetcher,
};
use pricedock_etl::normalize::{EntityNormalizer, LookupTables};
use pricedock_etl::pipeline::{report_failure, PipelineOrchestrator};
use pricedock_etl::{db, notify, Result as EtlResult};
use sqlx::PgPool;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pricedock-etl")]
#[command(author, version, about = "Retail price catalog loader")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover feed files on the chain's listing site and load them
    Run,

    /// Load store and price files from a local directory
    LoadDir {
        /// Directory containing *.gz feed files
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pricedock-etl")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;
    let _guard = init_logging(&log_config)?;

    let config = EtlConfig::load()?;
    info!(database = %config.redacted_database_url(), "Configuration loaded");

    let dir = match cli.command {
        Command::Migrate => {
            let pool = db::create_pool(&config.database)
                .await
                .context("Failed to connect to database")?;
            db::health_check(&pool).await?;
            db::run_migrations(&pool).await?;
            return Ok(());
        },
        Command::Run => None,
        Command::LoadDir { dir } => Some(dir),
    };

    // From here on every failure is reported
    let notifier = notify::notifier_from_config(&config);
    let inputs = match RunInputs::prepare(&config, dir) {
        Ok(inputs) => inputs,
        Err(err) => {
            report_failure(notifier.as_ref(), &config.chain.chain_name, &err).await;
            return Err(err.into());
        },
    };

    let mut orchestrator = PipelineOrchestrator::new(
        inputs.pool,
        config,
        inputs.normalizer,
        inputs.locator,
        inputs.fetcher,
        notifier,
    );

    let stats = orchestrator.run().await?;
    info!(?stats, "Load complete");
    Ok(())
}

/// Everything a run needs besides config and notifier
struct RunInputs {
    pool: PgPool,
    normalizer: EntityNormalizer,
    locator: Box<dyn FeedLocator>,
    fetcher: Box<dyn Fetcher>,
}

impl RunInputs {
    /// The pool connects lazily, so an unreachable database fails inside the
    /// run where it is reported.
    fn prepare(config: &EtlConfig, dir: Option<PathBuf>) -> EtlResult<Self> {
        let (locator, fetcher): (Box<dyn FeedLocator>, Box<dyn Fetcher>) = match dir {
            Some(dir) => (Box::new(DirectoryFeedLocator::new(dir)), Box::new(LocalFetcher)),
            None => (
                Box::new(HtmlListingLocator::new(&config.feed)?),
                Box::new(HttpFetcher::new(&config.feed)?),
            ),
        };

        let tables = match &config.lookup_tables {
            Some(path) => LookupTables::from_json_file(path)?,
            None => LookupTables::builtin(),
        };

        Ok(Self {
            pool: db::connect_lazy(&config.database)?,
            normalizer: EntityNormalizer::new(tables),
            locator,
            fetcher,
        })
    }
}
