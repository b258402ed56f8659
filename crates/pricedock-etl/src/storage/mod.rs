// Warehouse Storage Layer
//
// The only writers to the star schema:
// - dimensions: chain, city, store and product upserts keyed on natural keys
// - facts: append-only price observations
//
// Every per-file write runs inside one transaction. A transaction that is
// dropped without `commit()` rolls back, so an error on any path leaves none
// of that file's rows behind.

pub mod dimensions;
pub mod facts;

pub use dimensions::{DimensionStats, DimensionUpserter};
pub use facts::{FactLoadStats, FactLoader};

/// Upper bound on rows per multi-row statement (Postgres allows 65535 binds)
pub const MAX_CHUNK_ROWS: usize = 10_000;

pub(crate) fn clamp_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(1, MAX_CHUNK_ROWS)
}
