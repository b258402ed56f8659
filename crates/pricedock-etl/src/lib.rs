//! Pricedock ETL Library
//!
//! Loads a retail chain's published price catalogs (gzip-compressed XML store
//! directories and per-store price listings) into a star-schema warehouse.
//!
//! # Pipeline
//!
//! - [`parser`]: streaming record parser over gzip XML
//! - [`normalize`]: city canonicalization and store key derivation
//! - [`storage`]: dimension upserts and fact appends
//! - [`pipeline`]: run orchestration, stores before prices
//! - [`feed`] and [`notify`]: listing discovery, downloads, run reports
//!
//! # Example
//!
//! ```no_run
//! use pricedock_etl::{config::EtlConfig, db, feed, normalize, notify, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EtlConfig::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!
//!     let mut orchestrator = pipeline::PipelineOrchestrator::new(
//!         pool,
//!         config.clone(),
//!         normalize::EntityNormalizer::default(),
//!         Box::new(feed::HtmlListingLocator::new(&config.feed)?),
//!         Box::new(feed::HttpFetcher::new(&config.feed)?),
//!         notify::notifier_from_config(&config),
//!     );
//!     orchestrator.run().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod storage;

pub use error::{EtlError, Result};
