// src/aggregate/providers/mod.rs
pub mod agrimetrics;
pub mod aws_marketplace;
pub mod ckan;
pub mod databricks;
pub mod datarade;
pub mod defra;
pub mod ons;
pub mod opendatasoft;
pub mod snowflake;

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;

use crate::aggregate::http::{FetchRequest, FetchResponse, Fetcher};
use crate::aggregate::types::{AdapterError, ProviderAdapter};
use crate::config::AggregatorConfig;

/// Every configured adapter, in display-group order, minus any not in
/// `cfg.enabled_sources` (when that list is non-empty).
pub fn default_adapters(
    fetcher: Arc<dyn Fetcher>,
    cfg: &AggregatorConfig,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let all: Vec<Arc<dyn ProviderAdapter>> = vec![
        Arc::new(snowflake::SnowflakeAdapter::new(fetcher.clone())),
        Arc::new(databricks::DatabricksAdapter::new(fetcher.clone())),
        Arc::new(ons::OnsAdapter::new(fetcher.clone())),
        Arc::new(defra::DefraAdapter::new(fetcher.clone())),
        Arc::new(agrimetrics::AgrimetricsAdapter::new(fetcher.clone())),
        Arc::new(aws_marketplace::AwsMarketplaceAdapter::new(fetcher.clone())),
        Arc::new(ckan::CkanAdapter::new(ckan::CkanSite::ssen(), fetcher.clone())),
        Arc::new(ckan::CkanAdapter::new(ckan::CkanSite::data_gov_uk(), fetcher.clone())),
        Arc::new(ckan::CkanAdapter::new(ckan::CkanSite::london_datastore(), fetcher.clone())),
        Arc::new(ckan::CkanAdapter::new(ckan::CkanSite::nhsbsa(), fetcher.clone())),
        Arc::new(ckan::CkanAdapter::new(ckan::CkanSite::york_open_data(), fetcher.clone())),
        Arc::new(opendatasoft::OpenDataSoftAdapter::new(fetcher.clone())),
        Arc::new(datarade::DataradeAdapter::new(fetcher)),
    ];

    if cfg.enabled_sources.is_empty() {
        return all;
    }
    all.into_iter()
        .filter(|a| cfg.is_source_enabled(a.name()))
        .collect()
}

/// Issue a request, mapping transport failures to `AdapterError::Transport`.
pub(crate) async fn send(
    source_name: &'static str,
    fetcher: &dyn Fetcher,
    req: FetchRequest,
) -> Result<FetchResponse, AdapterError> {
    fetcher
        .fetch(req)
        .await
        .map_err(|e| AdapterError::Transport {
            source_name,
            message: e.0,
        })
}

pub(crate) fn status_error(source_name: &'static str, resp: &FetchResponse) -> AdapterError {
    AdapterError::Status {
        source_name,
        status: resp.status,
        content_type: resp.content_type.clone().unwrap_or_else(|| "none".into()),
    }
}

pub(crate) fn ensure_success(
    source_name: &'static str,
    resp: &FetchResponse,
) -> Result<(), AdapterError> {
    if resp.is_success() {
        Ok(())
    } else {
        Err(status_error(source_name, resp))
    }
}

/// Success status *and* a JSON content type (for providers known to vary it).
pub(crate) fn ensure_json(
    source_name: &'static str,
    resp: &FetchResponse,
) -> Result<(), AdapterError> {
    if resp.is_success() && resp.content_type_contains("application/json") {
        Ok(())
    } else {
        Err(status_error(source_name, resp))
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    source_name: &'static str,
    body: &[u8],
) -> Result<T, AdapterError> {
    serde_json::from_slice(body)
        .map_err(|e| AdapterError::shape(source_name, format!("invalid JSON: {e}")))
}

/// Per-provider normalization telemetry.
pub(crate) fn record_normalized(source_name: &'static str, started: Instant, count: usize) {
    let ms = started.elapsed().as_secs_f64() * 1_000.0;
    histogram!("aggregate_normalize_ms", "source" => source_name).record(ms);
    counter!("aggregate_listings_total", "source" => source_name).increment(count as u64);
}
