//! Catalogue search service. Binary entrypoint:
//! boots the Axum HTTP server with the aggregation pipeline and Prometheus metrics.

use catalog_aggregator::api::{self, AppState};
use catalog_aggregator::metrics::Metrics;
use catalog_aggregator::{init_tracing, Aggregator, AggregatorConfig};
use shuttle_axum::ShuttleAxum;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - AGGREGATOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("AGGREGATOR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if dev_flag && is_dev_env {
        init_tracing();
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = AggregatorConfig::load_default()
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("loading aggregator config")))?;
    tracing::info!(
        adapter_timeout_ms = cfg.adapter_timeout_ms,
        enabled = ?cfg.enabled_sources,
        "aggregator config loaded"
    );

    let aggregator = Aggregator::from_config(&cfg)
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("building HTTP client")))?;

    let mut router = api::router(AppState::new(aggregator));
    match Metrics::init(&cfg) {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(router.into())
}
