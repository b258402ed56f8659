// Fact Loading
//
// Streams a price listing into the warehouse. Records are converted and
// buffered one chunk at a time; each chunk first inserts products not yet seen
// in this file, then appends its price observations. The whole file shares one
// transaction, so either every row of the file is committed or none is.

use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::models::{observation_from_record, PriceFileContext, PriceObservation, PriceRow, Product};
use crate::normalize::EntityNormalizer;
use crate::parser::{ParseError, Record};
use crate::storage::DimensionUpserter;

/// Rows written for one price listing file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactLoadStats {
    /// Price observations appended
    pub rows: u64,
    /// Distinct barcodes in the file
    pub products_seen: usize,
    /// Products that did not exist before this file
    pub products_created: u64,
    pub chunks: usize,
}

/// Append-only writer for `fact_prices`
#[derive(Debug, Clone)]
pub struct FactLoader {
    dimensions: DimensionUpserter,
}

impl FactLoader {
    pub fn new(dimensions: DimensionUpserter) -> Self {
        Self { dimensions }
    }

    /// Load one price listing atomically.
    ///
    /// A parse error, an invalid value, or a failed write rolls back every row
    /// already written for the file.
    pub async fn load_price_file<I>(
        &self,
        records: I,
        ctx: &PriceFileContext,
        normalizer: &EntityNormalizer,
    ) -> Result<FactLoadStats>
    where
        I: IntoIterator<Item = std::result::Result<Record, ParseError>>,
    {
        let chunk_size = self.dimensions.chunk_size();
        let mut tx = self.dimensions.pool().begin().await?;

        let mut stats = FactLoadStats::default();
        let mut seen_barcodes: HashSet<String> = HashSet::new();
        let mut buffer: Vec<PriceRow> = Vec::with_capacity(chunk_size);

        for record in records {
            let row = record
                .and_then(|r| observation_from_record(&r, ctx, normalizer))
                .map_err(|e| EtlError::parse(&ctx.filename, e))?;
            buffer.push(row);

            if buffer.len() >= chunk_size {
                self.flush(&mut tx, &mut buffer, &mut seen_barcodes, &mut stats)
                    .await?;
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut tx, &mut buffer, &mut seen_barcodes, &mut stats)
                .await?;
        }

        tx.commit().await?;

        stats.products_seen = seen_barcodes.len();
        info!(
            file = %ctx.filename,
            store_id = %ctx.filename_store_id,
            rows = stats.rows,
            products = stats.products_seen,
            new_products = stats.products_created,
            "Price file committed"
        );

        Ok(stats)
    }

    async fn flush(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        buffer: &mut Vec<PriceRow>,
        seen_barcodes: &mut HashSet<String>,
        stats: &mut FactLoadStats,
    ) -> Result<()> {
        let mut products: Vec<Product> = Vec::new();
        let mut observations: Vec<PriceObservation> = Vec::with_capacity(buffer.len());

        for row in buffer.drain(..) {
            if seen_barcodes.insert(row.product.barcode.clone()) {
                products.push(row.product);
            }
            observations.push(row.observation);
        }

        stats.products_created += self.dimensions.upsert_products(tx, &products).await?;
        stats.rows += self.append(tx, &observations).await?;
        stats.chunks += 1;

        debug!(
            chunk = stats.chunks,
            rows = observations.len(),
            new_products = products.len(),
            "Flushed price chunk"
        );

        Ok(())
    }

    /// Append observations inside the caller's transaction.
    ///
    /// Every referenced barcode, store and chain must already exist; a missing
    /// one fails the insert with a foreign key violation.
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        observations: &[PriceObservation],
    ) -> Result<u64> {
        let mut inserted = 0;

        for chunk in observations.chunks(self.dimensions.chunk_size()) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO fact_prices (barcode, store_id, chain_id, sample_date, price) ",
            );

            query_builder.push_values(chunk, |mut b, obs| {
                b.push_bind(&obs.barcode)
                    .push_bind(&obs.store_id)
                    .push_bind(&obs.chain_id)
                    .push_bind(obs.sample_date)
                    .push_bind(&obs.price);
            });

            inserted += query_builder.build().execute(&mut **tx).await?.rows_affected();
        }

        Ok(inserted)
    }
}
