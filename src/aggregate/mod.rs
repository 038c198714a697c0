// src/aggregate/mod.rs
pub mod http;
pub mod interleave;
pub mod normalize;
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinError;
use tracing::Instrument;

use crate::aggregate::http::{Fetcher, HttpFetcher};
use crate::aggregate::types::{
    AdapterError, CanonicalListing, ProviderAdapter, ProviderQueryStat, QueryOutcome,
};
use crate::config::AggregatorConfig;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregate_queries_total", "Non-empty queries fanned out.");
        describe_counter!(
            "aggregate_provider_errors_total",
            "Adapter failures by source (transport, status, shape, decode, timeout, panic)."
        );
        describe_counter!(
            "aggregate_provider_results_total",
            "Listings returned by source."
        );
        describe_histogram!(
            "aggregate_provider_ms",
            "Wall time from dispatch to settlement per adapter, in milliseconds."
        );
        describe_histogram!(
            "aggregate_normalize_ms",
            "Time spent mapping a provider payload to listings, in milliseconds."
        );
        describe_counter!("aggregate_listings_total", "Listings produced by normalization.");
    });
}

/// Fans a query out to every adapter and merges what comes back.
///
/// Failures stay inside their adapter: each one becomes a [`ProviderQueryStat`] with an
/// error message and contributes no listings. `run` itself never fails.
pub struct Aggregator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    adapter_timeout: Duration,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, adapter_timeout: Duration) -> Self {
        Self {
            adapters,
            adapter_timeout,
        }
    }

    /// Production wiring: reqwest-backed fetcher plus the full provider set.
    pub fn from_config(cfg: &AggregatorConfig) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(cfg)?);
        Ok(Self::with_fetcher(fetcher, cfg))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>, cfg: &AggregatorConfig) -> Self {
        Self::new(
            providers::default_adapters(fetcher, cfg),
            Duration::from_millis(cfg.adapter_timeout_ms),
        )
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn adapter_timeout(&self) -> Duration {
        self.adapter_timeout
    }

    pub async fn run(&self, query: &str) -> QueryOutcome {
        let query = query.trim();
        if query.is_empty() {
            return QueryOutcome::default();
        }

        ensure_metrics_described();
        counter!("aggregate_queries_total").increment(1);

        let span = tracing::info_span!("aggregate", query = %query, adapters = self.adapters.len());
        self.fan_out(query).instrument(span).await
    }

    async fn fan_out(&self, query: &str) -> QueryOutcome {
        let started = Instant::now();
        let budget = self.adapter_timeout;

        let pending = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            let q = query.to_string();
            async move {
                let name = adapter.name();
                let task = tokio::spawn(
                    async move { tokio::time::timeout(budget, adapter.search(&q)).await }
                        .in_current_span(),
                );
                let settled = match task.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_elapsed)) => Err(AdapterError::Timeout {
                        source_name: name,
                        timeout_ms: budget.as_millis() as u64,
                    }),
                    Err(join) => Err(AdapterError::Panicked {
                        source_name: name,
                        message: panic_message(join),
                    }),
                };
                (name, started.elapsed(), settled)
            }
        });

        // Settled in adapter order, whatever the completion order was.
        let settled = join_all(pending).await;

        let mut records: Vec<CanonicalListing> = Vec::new();
        let mut stats = Vec::with_capacity(settled.len());
        for (name, elapsed, result) in settled {
            let ms = elapsed.as_millis() as u64;
            histogram!("aggregate_provider_ms", "source" => name).record(elapsed.as_secs_f64() * 1_000.0);
            match result {
                Ok(mut listings) => {
                    counter!("aggregate_provider_results_total", "source" => name)
                        .increment(listings.len() as u64);
                    stats.push(ProviderQueryStat::succeeded(name, ms, listings.len()));
                    records.append(&mut listings);
                }
                Err(e) => {
                    tracing::warn!(source = name, kind = e.kind(), error = %e, "adapter failed");
                    counter!("aggregate_provider_errors_total", "source" => name).increment(1);
                    stats.push(ProviderQueryStat::failed(name, ms, &e));
                }
            }
        }
        stats.sort_by(|a, b| a.source.cmp(&b.source));

        let results = interleave::interleave(records);
        let failed = stats.iter().filter(|s| s.is_error()).count();
        tracing::info!(
            results = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query aggregated"
        );

        QueryOutcome {
            query: query.to_string(),
            results,
            stats,
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string()),
        Err(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Boom;

    #[async_trait]
    impl ProviderAdapter for Boom {
        async fn search(&self, _query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
            panic!("bad selector state");
        }
        fn name(&self) -> &'static str {
            "Boom"
        }
    }

    struct Slow;

    #[async_trait]
    impl ProviderAdapter for Slow {
        async fn search(&self, _query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![])
        }
        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    #[tokio::test]
    async fn panic_is_contained_to_its_adapter() {
        let agg = Aggregator::new(vec![Arc::new(Boom)], Duration::from_secs(1));
        let out = agg.run("x").await;
        assert_eq!(out.stats.len(), 1);
        let err = out.stats[0].error.as_deref().unwrap_or_default();
        assert!(err.contains("bad selector state"), "{err}");
        assert!(out.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_adapter_times_out() {
        let agg = Aggregator::new(vec![Arc::new(Slow)], Duration::from_millis(50));
        let out = agg.run("x").await;
        assert_eq!(
            out.stats[0].error.as_deref(),
            Some("Slow timed out after 50ms")
        );
        assert_eq!(out.stats[0].result_count, 0);
    }

    #[tokio::test]
    async fn blank_query_skips_everything() {
        let agg = Aggregator::new(vec![Arc::new(Boom)], Duration::from_secs(1));
        assert_eq!(agg.run("   ").await, QueryOutcome::default());
    }
}
