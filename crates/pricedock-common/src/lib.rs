//! Pricedock Common Library
//!
//! Shared plumbing for the pricedock workspace members.
//!
//! - **Logging**: one place to configure the global `tracing` subscriber

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;
