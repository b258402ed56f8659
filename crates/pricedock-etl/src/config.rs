// Pipeline Configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EtlError, Result};

pub const DEFAULT_CHAIN_ID: &str = "7290027600007";
pub const DEFAULT_CHAIN_NAME: &str = "שופרסל";
pub const DEFAULT_PRODUCT_CATEGORY: &str = "כללי";
pub const DEFAULT_FEED_URL: &str = "http://prices.shufersal.co.il/";
pub const DEFAULT_MAX_PAGES: u32 = 150;
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

/// Retail chain identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub chain_name: String,
    /// Placeholder category assigned to every new product
    pub product_category: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            chain_name: DEFAULT_CHAIN_NAME.to_string(),
            product_category: DEFAULT_PRODUCT_CATEGORY.to_string(),
        }
    }
}

/// Feed discovery and download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Listing page base URL (paged with `?page=N`)
    pub base_url: String,

    pub max_pages: u32,

    /// Stop collecting links once this many are found (None = all)
    pub max_files: Option<usize>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Download directory; `stores/` and `prices/` are created beneath it
    pub work_dir: PathBuf,

    /// Keep downloaded files after they are processed
    pub keep_downloads: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_URL.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            max_files: None,
            timeout_secs: 300,
            work_dir: PathBuf::from("./feeds"),
            keep_downloads: false,
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    pub feed: FeedConfig,

    /// Rows per multi-row insert statement
    pub insert_chunk_size: usize,

    /// JSON file replacing the built-in lookup tables
    pub lookup_tables: Option<PathBuf>,

    /// Webhook receiving run reports (None = log only)
    pub notify_webhook: Option<String>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            chain: ChainConfig::default(),
            feed: FeedConfig::default(),
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
            lookup_tables: None,
            notify_webhook: None,
        }
    }
}

impl EtlConfig {
    /// Load from `.env` (if present) and the process environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read the process environment without validating
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let database_url = env_string("DATABASE_URL")
            .or_else(|| env_string("SUPABASE_DATABASE_URL"))
            .unwrap_or_default();

        Ok(Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(defaults.database.max_connections),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or(defaults.database.min_connections),
                connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT")?
                    .unwrap_or(defaults.database.connect_timeout_secs),
            },
            chain: ChainConfig {
                chain_id: env_string("PRICEDOCK_CHAIN_ID").unwrap_or(defaults.chain.chain_id),
                chain_name: env_string("PRICEDOCK_CHAIN_NAME").unwrap_or(defaults.chain.chain_name),
                product_category: env_string("PRICEDOCK_PRODUCT_CATEGORY")
                    .unwrap_or(defaults.chain.product_category),
            },
            feed: FeedConfig {
                base_url: env_string("PRICEDOCK_FEED_URL").unwrap_or(defaults.feed.base_url),
                max_pages: env_parse("PRICEDOCK_FEED_MAX_PAGES")?
                    .unwrap_or(defaults.feed.max_pages),
                max_files: env_parse("PRICEDOCK_FEED_MAX_FILES")?,
                timeout_secs: env_parse("PRICEDOCK_HTTP_TIMEOUT")?
                    .unwrap_or(defaults.feed.timeout_secs),
                work_dir: env_string("PRICEDOCK_WORK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.feed.work_dir),
                keep_downloads: env_parse("PRICEDOCK_KEEP_DOWNLOADS")?
                    .unwrap_or(defaults.feed.keep_downloads),
            },
            insert_chunk_size: env_parse("PRICEDOCK_INSERT_CHUNK_SIZE")?
                .unwrap_or(defaults.insert_chunk_size),
            lookup_tables: env_string("PRICEDOCK_LOOKUP_TABLES").map(PathBuf::from),
            notify_webhook: env_string("PRICEDOCK_NOTIFY_WEBHOOK"),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(EtlError::config(
                "DATABASE_URL (or SUPABASE_DATABASE_URL) must be set",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(EtlError::config(format!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.chain.chain_id.trim().is_empty() {
            return Err(EtlError::config("Chain id cannot be empty"));
        }

        if self.insert_chunk_size == 0 {
            return Err(EtlError::config("Insert chunk size must be greater than 0"));
        }

        if self.feed.timeout_secs == 0 {
            return Err(EtlError::config("HTTP timeout must be greater than 0"));
        }

        if self.feed.max_pages == 0 {
            return Err(EtlError::config("Listing max pages must be greater than 0"));
        }

        Ok(())
    }

    /// Database URL with any password masked, for logging
    pub fn redacted_database_url(&self) -> String {
        redact_url(&self.database.url)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| EtlError::config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        None => Ok(None),
    }
}

fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
