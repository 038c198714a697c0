// src/aggregate/providers/ons.rs
//! ONS SRS Metadata Catalogue. A Next.js site: the JSON search route is versioned by a
//! `buildId` that changes on every deployment, so each search first loads the HTML page,
//! reads the current `buildId` from its `__NEXT_DATA__` blob, then calls the data route.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_json, ensure_success, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{
    encode_component, extract_next_data, first_present, format_updated, join_list, null_as_default,
};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "ONS";
pub const BASE_URL: &str = "https://ons.metadata.works";
pub const PAGE_URL: &str = "https://ons.metadata.works/browser/search";
const DEFAULT_PROVIDER_DESCRIPTION: &str = "ONS SRS Metadata Catalogue";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextData {
    build_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnsSearchResponse {
    page_props: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    search_result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    content: Option<Vec<OnsItem>>,
}

#[derive(Debug, Deserialize)]
struct OnsItem {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    keywords: Vec<String>,
    publisher: Option<String>,
    origin: Option<Origin>,
    modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Origin {
    name: Option<String>,
    link: Option<String>,
}

pub struct OnsAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl OnsAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Pull the deployment's `buildId` out of the search page.
    pub fn build_id_from_page(html: &str) -> Result<String, AdapterError> {
        let blob = extract_next_data(html)
            .ok_or_else(|| AdapterError::decode(SOURCE, "page missing __NEXT_DATA__ script tag"))?;
        let data: NextData = serde_json::from_str(blob)
            .map_err(|e| AdapterError::shape(SOURCE, format!("__NEXT_DATA__ is not JSON: {e}")))?;
        data.build_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AdapterError::shape(SOURCE, "page missing buildId"))
    }

    pub fn data_url(build_id: &str, query: &str) -> String {
        format!(
            "{BASE_URL}/_next/data/{}/browser/search.json?searchterm={}",
            encode_component(build_id),
            encode_component(query)
        )
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: OnsSearchResponse = parse_json(SOURCE, body)?;
        let items = data
            .page_props
            .and_then(|p| p.search_result)
            .and_then(|s| s.content)
            .ok_or_else(|| AdapterError::shape(SOURCE, "pageProps.searchResult.content"))?;

        Ok(items
            .into_iter()
            .map(|it| {
                let (origin_name, origin_link) = match it.origin {
                    Some(o) => (o.name, o.link),
                    None => (None, None),
                };
                let url = first_present([origin_link.as_deref()], || {
                    format!("{BASE_URL}/browser/dataset/{}/0", it.id)
                });
                CanonicalListing {
                    title: it.title.unwrap_or_default(),
                    description: it.summary.unwrap_or_default(),
                    subtitle: join_list(&it.keywords),
                    provider: ListingProvider {
                        title: it.publisher.unwrap_or_default(),
                        description: first_present([origin_name.as_deref()], || {
                            DEFAULT_PROVIDER_DESCRIPTION.to_string()
                        }),
                    },
                    url,
                    source: SOURCE.to_string(),
                    updated: format_updated(it.modified.as_deref()),
                    id: it.id,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for OnsAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        // Step 1: never cached; the build id is only valid for the current deployment.
        let page = send(SOURCE, self.fetcher.as_ref(), FetchRequest::get(PAGE_URL)).await?;
        ensure_success(SOURCE, &page)?;
        let build_id = Self::build_id_from_page(&page.text())?;
        tracing::debug!(target: "aggregate", source = SOURCE, %build_id, "resolved build id");

        // Step 2: key includes the build id so a redeploy never serves a stale payload.
        let req = FetchRequest::get(Self::data_url(&build_id, query))
            .header("Accept", "application/json")
            .cache_key(format!("ons-search-{build_id}-{query}"));
        let resp = send(SOURCE, self.fetcher.as_ref(), req).await?;
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
