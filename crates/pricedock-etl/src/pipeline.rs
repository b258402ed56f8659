// Pipeline Orchestration
//
// One run moves through:
//
//   Idle -> ChainSeeded -> StoresPhase -> FactsPhase -> Reported -> Done
//
// with Failed reachable from every active state. Files are handled strictly
// one at a time in listing order. Every store directory is committed before
// the first price listing is opened, so fact foreign keys always resolve.
// The first failing file aborts the run.

use sqlx::PgPool;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::feed::{FeedFile, FeedKind, FeedLocator, Fetcher};
use crate::models::{Chain, PriceFileContext, StoreBatch};
use crate::normalize::EntityNormalizer;
use crate::notify::Notifier;
use crate::parser::GzRecordStream;
use crate::storage::{DimensionStats, DimensionUpserter, FactLoadStats, FactLoader};

// ============================================================================
// Run State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ChainSeeded,
    StoresPhase,
    FactsPhase,
    Reported,
    Done,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, ChainSeeded)
                | (ChainSeeded, StoresPhase)
                | (StoresPhase, FactsPhase)
                | (FactsPhase, Reported)
                | (Reported, Done)
                | (Idle | ChainSeeded | StoresPhase | FactsPhase | Reported, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::ChainSeeded => "chain_seeded",
            RunState::StoresPhase => "stores_phase",
            RunState::FactsPhase => "facts_phase",
            RunState::Reported => "reported",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Statistics and Reports
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub store_files: usize,
    pub price_files: usize,
    pub cities_upserted: usize,
    pub stores_upserted: usize,
    pub price_rows: u64,
    pub products_created: u64,
    /// Listed files that are neither store directories nor price listings
    pub skipped_files: usize,
}

impl RunStats {
    fn add_dimensions(&mut self, stats: &DimensionStats) {
        self.store_files += 1;
        self.cities_upserted += stats.cities;
        self.stores_upserted += stats.stores;
    }

    fn add_facts(&mut self, stats: &FactLoadStats) {
        self.price_files += 1;
        self.price_rows += stats.rows;
        self.products_created += stats.products_created;
    }
}

/// Summary handed to the notifier after a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub chain_name: String,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn subject(&self) -> String {
        format!("ETL Success: {}", self.chain_name)
    }

    pub fn body(&self) -> String {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        format!(
            "{} data pipeline - SUCCESS\n\n\
             Run time: {:.2} minutes\n\
             Store files processed: {}\n\
             Price files processed: {}\n\
             Total price rows inserted: {}\n",
            self.chain_name,
            minutes,
            self.stats.store_files,
            self.stats.price_files,
            self.stats.price_rows
        )
    }
}

/// Subject and body describing a failed run
pub fn failure_report(chain_name: &str, err: &EtlError) -> (String, String) {
    let subject = format!("ETL FAILED: {}", chain_name);
    let body = format!(
        "{} data pipeline - FAILED\n\n\
         Error kind: {}\n\
         Error details:\n{}\n",
        chain_name,
        err.kind(),
        err.chain()
    );
    (subject, body)
}

/// Send the failure report for `err`, logging delivery problems.
///
/// Also used for errors raised before an orchestrator exists.
pub async fn report_failure(notifier: &dyn Notifier, chain_name: &str, err: &EtlError) {
    let (subject, body) = failure_report(chain_name, err);
    if let Err(e) = notifier.notify(&subject, &body).await {
        error!(error = %e, "Failed to deliver failure report");
    }
}

/// Split listed files into store directories and price listings, keeping order
pub fn partition_feed(files: Vec<FeedFile>) -> (Vec<FeedFile>, Vec<FeedFile>, usize) {
    let mut stores = Vec::new();
    let mut prices = Vec::new();
    let mut skipped = 0;

    for file in files {
        match file.kind() {
            Some(FeedKind::Stores) => stores.push(file),
            Some(FeedKind::Prices) => prices.push(file),
            None => skipped += 1,
        }
    }

    (stores, prices, skipped)
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct PipelineOrchestrator {
    config: EtlConfig,
    normalizer: EntityNormalizer,
    dimensions: DimensionUpserter,
    facts: FactLoader,
    locator: Box<dyn FeedLocator>,
    fetcher: Box<dyn Fetcher>,
    notifier: Box<dyn Notifier>,
    state: RunState,
}

impl PipelineOrchestrator {
    pub fn new(
        pool: PgPool,
        config: EtlConfig,
        normalizer: EntityNormalizer,
        locator: Box<dyn FeedLocator>,
        fetcher: Box<dyn Fetcher>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let dimensions = DimensionUpserter::with_chunk_size(pool, config.insert_chunk_size);
        let facts = FactLoader::new(dimensions.clone());

        Self {
            config,
            normalizer,
            dimensions,
            facts,
            locator,
            fetcher,
            notifier,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected pipeline state transition");
        }
        info!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }

    /// Execute one full run and report its outcome.
    ///
    /// Notification failures are logged and never change the result.
    pub async fn run(&mut self) -> Result<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();

        info!(chain_id = %self.config.chain.chain_id, "Starting price catalog run");

        match self.execute(&mut stats).await {
            Ok(()) => {
                self.transition(RunState::Reported);

                let report = RunReport {
                    chain_name: self.config.chain.chain_name.clone(),
                    stats: stats.clone(),
                    elapsed: started.elapsed(),
                };

                info!(
                    store_files = stats.store_files,
                    price_files = stats.price_files,
                    price_rows = stats.price_rows,
                    elapsed_secs = report.elapsed.as_secs(),
                    "Run completed"
                );

                if let Err(e) = self.notifier.notify(&report.subject(), &report.body()).await {
                    warn!(error = %e, "Failed to deliver success report");
                }

                self.transition(RunState::Done);
                Ok(stats)
            },
            Err(err) => {
                self.transition(RunState::Failed);
                error!(kind = err.kind(), error = %err.chain(), "Run failed");

                report_failure(self.notifier.as_ref(), &self.config.chain.chain_name, &err).await;

                Err(err)
            },
        }
    }

    async fn execute(&mut self, stats: &mut RunStats) -> Result<()> {
        let chain = Chain {
            chain_id: self.config.chain.chain_id.clone(),
            chain_name: self.config.chain.chain_name.clone(),
        };
        self.dimensions.seed_chain(&chain).await?;
        self.transition(RunState::ChainSeeded);

        let files = self.locator.locate().await?;
        let (store_files, price_files, skipped) = partition_feed(files);
        stats.skipped_files = skipped;

        info!(
            store_files = store_files.len(),
            price_files = price_files.len(),
            skipped,
            "Feed located"
        );

        self.transition(RunState::StoresPhase);
        for file in &store_files {
            let dim_stats = self.process_store_file(file).await?;
            stats.add_dimensions(&dim_stats);
        }

        self.transition(RunState::FactsPhase);
        for file in &price_files {
            let fact_stats = self.process_price_file(file).await?;
            stats.add_facts(&fact_stats);
        }

        Ok(())
    }

    async fn process_store_file(&self, file: &FeedFile) -> Result<DimensionStats> {
        info!(filename = %file.filename, "Processing store directory");

        let fetched = self.fetcher.fetch(file, FeedKind::Stores).await?;
        let result = self.load_store_file(&file.filename, &fetched.path).await;
        self.fetcher.release(fetched).await;
        result
    }

    async fn load_store_file(&self, filename: &str, path: &Path) -> Result<DimensionStats> {
        let records = GzRecordStream::open(path, FeedKind::Stores.record_tag())
            .map_err(|e| EtlError::parse(filename, e))?;

        let batch = StoreBatch::from_records(records, &self.config.chain.chain_id, &self.normalizer)
            .map_err(|e| EtlError::parse(filename, e))?;

        if batch.is_empty() {
            warn!(filename, "Store directory contains no stores");
        }

        self.dimensions.upsert_store_batch(&batch).await
    }

    async fn process_price_file(&self, file: &FeedFile) -> Result<FactLoadStats> {
        info!(filename = %file.filename, "Processing price listing");

        let ctx = PriceFileContext::for_file(
            &file.filename,
            &self.config.chain.chain_id,
            &self.config.chain.product_category,
            &self.normalizer,
        );
        if !file.filename.contains('-') {
            warn!(
                filename = %file.filename,
                store_id = %ctx.filename_store_id,
                "Filename has no store code; using fallback store"
            );
        }

        let fetched = self.fetcher.fetch(file, FeedKind::Prices).await?;
        let result = self.load_price_file(&ctx, &fetched.path).await;
        self.fetcher.release(fetched).await;
        result
    }

    async fn load_price_file(&self, ctx: &PriceFileContext, path: &Path) -> Result<FactLoadStats> {
        let records = GzRecordStream::open(path, FeedKind::Prices.record_tag())
            .map_err(|e| EtlError::parse(&ctx.filename, e))?;

        self.facts.load_price_file(records, ctx, &self.normalizer).await
    }
}
