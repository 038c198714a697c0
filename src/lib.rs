// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod metrics;
pub mod render;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::types::{
    AdapterError, CanonicalListing, ListingProvider, ProviderAdapter, ProviderQueryStat,
    QueryOutcome,
};
pub use crate::aggregate::Aggregator;
pub use crate::api::router;
pub use crate::config::AggregatorConfig;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "catalog_aggregator=info,warn";

/// Install a compact `fmt` subscriber filtered by `RUST_LOG`
/// (default [`DEFAULT_LOG_FILTER`]). Returns `false` if a subscriber was already set.
pub fn init_tracing() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .is_ok()
}
