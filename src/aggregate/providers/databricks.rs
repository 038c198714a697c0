// src/aggregate/providers/databricks.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_json, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{contains_ci, format_updated, null_as_default};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "Databricks";
pub const LISTINGS_URL: &str =
    "https://marketplace.databricks.com/api/2.0/public-marketplace-listings";
/// The endpoint ignores the query, so one cache entry serves every search.
pub const CACHE_KEY: &str = "databricks";

#[derive(Debug, Deserialize)]
struct DatabricksResponse {
    listings: Option<Vec<DatabricksListing>>,
}

#[derive(Debug, Deserialize)]
struct DatabricksListing {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    summary: Summary,
    #[serde(default, deserialize_with = "null_as_default")]
    detail: Detail,
    #[serde(default, deserialize_with = "null_as_default")]
    provider_summary: ProviderSummary,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    name: Option<String>,
    subtitle: Option<String>,
    updated_at: Option<String>, // epoch millis as a string
}

#[derive(Debug, Default, Deserialize)]
struct Detail {
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSummary {
    name: Option<String>,
    description: Option<String>,
}

/// Databricks Marketplace. The API has no server-side search: it returns the whole
/// public catalogue, which is filtered here.
pub struct DatabricksAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl DatabricksAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: DatabricksResponse = parse_json(SOURCE, body)?;
        let listings = data
            .listings
            .ok_or_else(|| AdapterError::shape(SOURCE, "listings"))?;

        Ok(listings
            .into_iter()
            .map(|it| CanonicalListing {
                url: format!("https://marketplace.databricks.com/details/{}/listing", it.id),
                title: it.summary.name.unwrap_or_default(),
                subtitle: it.summary.subtitle.unwrap_or_default(),
                description: it.detail.description.unwrap_or_default(),
                provider: ListingProvider {
                    title: it.provider_summary.name.unwrap_or_default(),
                    description: it.provider_summary.description.unwrap_or_default(),
                },
                source: SOURCE.to_string(),
                updated: format_updated(it.summary.updated_at.as_deref()),
                id: it.id,
            })
            .collect())
    }

    /// Case-insensitive substring match on title, description, or subtitle.
    pub fn filter_matching(listings: Vec<CanonicalListing>, query: &str) -> Vec<CanonicalListing> {
        let needle = query.to_lowercase();
        listings
            .into_iter()
            .filter(|l| {
                contains_ci(&l.title, &needle)
                    || contains_ci(&l.description, &needle)
                    || contains_ci(&l.subtitle, &needle)
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for DatabricksAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let req = FetchRequest::get(LISTINGS_URL)
            .header("Accept", "application/json")
            .cache_key(CACHE_KEY);
        let resp = send(SOURCE, self.fetcher.as_ref(), req).await?;
        ensure_json(SOURCE, &resp)?;

        let t0 = std::time::Instant::now();
        let out = Self::filter_matching(Self::normalize(&resp.body)?, query);
        record_normalized(SOURCE, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
