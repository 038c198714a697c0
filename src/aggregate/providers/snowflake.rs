// src/aggregate/providers/snowflake.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_json, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{first_present, format_updated, null_as_default};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "Snowflake";
pub const SEARCH_URL: &str = "https://app.snowflake.com/v0/guest/snowscope/search";
const LISTING_URL_BASE: &str = "https://app.snowflake.com/marketplace/listing";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnowflakeResponse {
    result_groups: Option<Vec<ResultGroup>>,
}

#[derive(Debug, Deserialize)]
struct ResultGroup {
    results: Option<Vec<SnowflakeItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnowflakeItem {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    type_specific: TypeSpecific,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeSpecific {
    global_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    listing: SnowflakeListing,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnowflakeListing {
    title: Option<String>,
    description: Option<String>,
    subtitle: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    provider: SnowflakeProvider,
    url: Option<String>,
    last_published: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SnowflakeProvider {
    title: Option<String>,
    description: Option<String>,
}

/// Snowflake Marketplace guest search (POST JSON).
pub struct SnowflakeAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl SnowflakeAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn request(query: &str) -> FetchRequest {
        let body = json!({
            "query": query,
            "sort": { "field": "mostRelevant" },
            "numSnippets": 0,
            "corpus": "marketplace",
            "client": "marketplaceSearch",
            "resultGroups": true,
        });
        FetchRequest::post(SEARCH_URL, body.to_string())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .cache_key(format!("snowflake-{query}"))
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: SnowflakeResponse = parse_json(SOURCE, body)?;
        let items = data
            .result_groups
            .and_then(|groups| groups.into_iter().next())
            .and_then(|group| group.results)
            .ok_or_else(|| AdapterError::shape(SOURCE, "resultGroups[0].results"))?;

        Ok(items
            .into_iter()
            .filter(|it| it.kind == "listing")
            .map(|it| {
                let id = it.type_specific.global_name.unwrap_or_default();
                let l = it.type_specific.listing;
                let url = first_present([l.url.as_deref()], || format!("{LISTING_URL_BASE}/{id}"));
                CanonicalListing {
                    title: l.title.unwrap_or_default(),
                    description: l.description.unwrap_or_default(),
                    subtitle: l.subtitle.unwrap_or_default(),
                    provider: ListingProvider {
                        title: l.provider.title.unwrap_or_default(),
                        description: l.provider.description.unwrap_or_default(),
                    },
                    url,
                    source: SOURCE.to_string(),
                    updated: format_updated(l.last_published.as_deref()),
                    id,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for SnowflakeAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let resp = send(SOURCE, self.fetcher.as_ref(), Self::request(query)).await?;
        ensure_json(SOURCE, &resp)?;

        let t0 = std::time::Instant::now();
        let out = Self::normalize(&resp.body)?;
        record_normalized(SOURCE, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
