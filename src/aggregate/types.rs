// src/aggregate/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Publishing organization behind a listing (not the catalogue itself).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingProvider {
    pub title: String,
    pub description: String,
}

/// The one record shape every adapter produces. Every field is always populated;
/// absent upstream data becomes an empty string or a constructed fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalListing {
    pub id: String, // provider-scoped, not unique across providers
    pub title: String,
    pub description: String,
    pub subtitle: String, // usually a comma-joined tag list
    pub provider: ListingProvider,
    pub url: String,
    pub source: String,  // e.g. "Snowflake", "Defra"
    pub updated: String, // "DD/MM/YYYY HH:MM" or "unknown"
}

/// Per-adapter telemetry for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQueryStat {
    pub source: String,
    pub duration_ms: u64,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderQueryStat {
    pub fn succeeded(source: &str, duration_ms: u64, result_count: usize) -> Self {
        Self {
            source: source.to_string(),
            duration_ms,
            result_count,
            error: None,
        }
    }

    pub fn failed(source: &str, duration_ms: u64, error: &AdapterError) -> Self {
        Self {
            source: source.to_string(),
            duration_ms,
            result_count: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything one query produced: merged display order plus one stat per adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryOutcome {
    pub query: String,
    pub results: Vec<CanonicalListing>,
    pub stats: Vec<ProviderQueryStat>,
}

/// Why an adapter could not obtain results. "Zero results" is never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Connection / DNS / transport-level timeout.
    #[error("{source_name} request failed: {message}")]
    Transport {
        source_name: &'static str,
        message: String,
    },

    /// Upstream answered with a non-2xx status or the wrong content type.
    #[error("{source_name} API error: Status {status}, Content-Type: {content_type}")]
    Status {
        source_name: &'static str,
        status: u16,
        content_type: String,
    },

    /// Response arrived but lacks the structure the normalizer requires.
    #[error("{source_name} API response missing expected data structure: {detail}")]
    Shape {
        source_name: &'static str,
        detail: String,
    },

    /// Compressed payload failed to inflate, or an embedded-data block is missing.
    #[error("{source_name} payload could not be decoded: {detail}")]
    Decode {
        source_name: &'static str,
        detail: String,
    },

    #[error("{source_name} timed out after {timeout_ms}ms")]
    Timeout {
        source_name: &'static str,
        timeout_ms: u64,
    },

    #[error("{source_name} adapter aborted unexpectedly: {message}")]
    Panicked {
        source_name: &'static str,
        message: String,
    },
}

impl AdapterError {
    pub fn shape(source_name: &'static str, detail: impl Into<String>) -> Self {
        Self::Shape {
            source_name,
            detail: detail.into(),
        }
    }

    pub fn decode(source_name: &'static str, detail: impl Into<String>) -> Self {
        Self::Decode {
            source_name,
            detail: detail.into(),
        }
    }

    /// Short machine label, used as a metrics/log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Shape { .. } => "shape",
            Self::Decode { .. } => "decode",
            Self::Timeout { .. } => "timeout",
            Self::Panicked { .. } => "panicked",
        }
    }
}

/// One external catalogue. Stateless across calls; configured once at startup.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Query the provider. `Ok(vec![])` means the provider answered with nothing.
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError>;

    /// Display name, also used as `CanonicalListing::source`.
    fn name(&self) -> &'static str;
}
