// Dimension Upserts
//
// Conflict policy per table:
// - dim_chains, dim_products: insert-if-absent (ON CONFLICT DO NOTHING)
// - dim_city: insert-or-update region
// - dim_stores: insert-or-update store_name and city
//
// Cities are written before stores in the same transaction so the store city
// foreign key always resolves.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Chain, City, Product, Store, StoreBatch};
use crate::storage::clamp_chunk_size;

/// Rows written for one store directory file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionStats {
    pub cities: usize,
    pub stores: usize,
}

/// Natural-key upserts for the dimension tables
#[derive(Debug, Clone)]
pub struct DimensionUpserter {
    db: PgPool,
    chunk_size: usize,
}

impl DimensionUpserter {
    pub fn new(db: PgPool) -> Self {
        Self::with_chunk_size(db, crate::config::DEFAULT_INSERT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(db: PgPool, chunk_size: usize) -> Self {
        Self {
            db,
            chunk_size: clamp_chunk_size(chunk_size),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Insert the chain row if absent. Returns whether a row was created.
    pub async fn seed_chain(&self, chain: &Chain) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO dim_chains (chain_id, chain_name)
            VALUES ($1, $2)
            ON CONFLICT (chain_id) DO NOTHING
            "#,
        )
        .bind(&chain.chain_id)
        .bind(&chain.chain_name)
        .execute(&self.db)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(chain_id = %chain.chain_id, created, "Seeded chain dimension");
        Ok(created)
    }

    /// Upsert all cities and stores of one store directory file atomically
    pub async fn upsert_store_batch(&self, batch: &StoreBatch) -> Result<DimensionStats> {
        let mut tx = self.db.begin().await?;

        for chunk in batch.cities.chunks(self.chunk_size) {
            self.upsert_cities(&mut tx, chunk).await?;
        }

        for chunk in batch.stores.chunks(self.chunk_size) {
            self.upsert_stores(&mut tx, chunk).await?;
        }

        tx.commit().await?;

        info!(
            cities = batch.cities.len(),
            stores = batch.stores.len(),
            "Store dimensions committed"
        );

        Ok(DimensionStats {
            cities: batch.cities.len(),
            stores: batch.stores.len(),
        })
    }

    /// Insert or refresh the region of each city, inside the caller's transaction
    pub async fn upsert_cities(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cities: &[City],
    ) -> Result<()> {
        if cities.is_empty() {
            return Ok(());
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO dim_city (city_name, region) ");

        query_builder.push_values(cities, |mut b, city| {
            b.push_bind(&city.city_name).push_bind(&city.region);
        });

        query_builder.push(" ON CONFLICT (city_name) DO UPDATE SET region = EXCLUDED.region");

        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Insert or refresh store name and city. Cities must already exist.
    pub async fn upsert_stores(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        stores: &[Store],
    ) -> Result<()> {
        if stores.is_empty() {
            return Ok(());
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO dim_stores (store_id, chain_id, store_name, city) ");

        query_builder.push_values(stores, |mut b, store| {
            b.push_bind(&store.store_id)
                .push_bind(&store.chain_id)
                .push_bind(&store.store_name)
                .push_bind(&store.city);
        });

        query_builder.push(
            r#"
            ON CONFLICT (store_id)
            DO UPDATE SET
                store_name = EXCLUDED.store_name,
                city = EXCLUDED.city
            "#,
        );

        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Insert products that are not yet known, inside the caller's transaction.
    ///
    /// Callers pass products distinct by barcode; existing rows are left as is.
    /// Returns the number of rows actually created.
    pub async fn upsert_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        products: &[Product],
    ) -> Result<u64> {
        let mut created = 0;

        for chunk in products.chunks(self.chunk_size) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO dim_products (barcode, item_name, category, manufacturer) ",
            );

            query_builder.push_values(chunk, |mut b, product| {
                b.push_bind(&product.barcode)
                    .push_bind(&product.item_name)
                    .push_bind(&product.category)
                    .push_bind(&product.manufacturer);
            });

            query_builder.push(" ON CONFLICT (barcode) DO NOTHING");

            created += query_builder.build().execute(&mut **tx).await?.rows_affected();
        }

        Ok(created)
    }
}
