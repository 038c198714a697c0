// src/aggregate/providers/defra.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{
    encode_component, extract_next_data, join_list, null_as_default, RawTimestamp,
    UNKNOWN_UPDATED,
};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "Defra";
pub const BASE_URL: &str = "https://environment.data.gov.uk";
const PROVIDER_DESCRIPTION: &str = "Defra Data Services Platform";

#[derive(Debug, Deserialize)]
struct DefraPage {
    props: Option<Props>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    page_props: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    datasets: Option<Vec<DefraDataset>>,
}

#[derive(Debug, Deserialize)]
struct DefraDataset {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    title: Option<String>,
    description: Option<String>,
    creator: Option<String>,
    modified: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
}

/// Defra Data Services Platform search page (server-rendered, data in `__NEXT_DATA__`).
pub struct DefraAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl DefraAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn search_url(query: &str) -> String {
        format!(
            "{BASE_URL}/searchresults?query={}&searchtype=&orderby=default&pagesize=10&page=1",
            encode_component(query)
        )
    }

    fn normalize(html: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let blob = extract_next_data(html)
            .ok_or_else(|| AdapterError::decode(SOURCE, "page missing __NEXT_DATA__ script tag"))?;
        let page: DefraPage = serde_json::from_str(blob)
            .map_err(|e| AdapterError::shape(SOURCE, format!("__NEXT_DATA__ is not JSON: {e}")))?;
        let datasets = page
            .props
            .and_then(|p| p.page_props)
            .and_then(|p| p.datasets)
            .ok_or_else(|| AdapterError::shape(SOURCE, "props.pageProps.datasets"))?;

        Ok(datasets
            .into_iter()
            .map(|d| CanonicalListing {
                url: format!("{BASE_URL}/dataset/{}", d.id),
                title: d.title.unwrap_or_default(),
                description: d.description.unwrap_or_default(),
                subtitle: join_list(&d.tags),
                provider: ListingProvider {
                    title: d.creator.unwrap_or_default(),
                    description: PROVIDER_DESCRIPTION.to_string(),
                },
                source: SOURCE.to_string(),
                updated: d
                    .modified
                    .map(|m| m.to_display())
                    .unwrap_or_else(|| UNKNOWN_UPDATED.to_string()),
                id: d.id,
            })
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for DefraAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let req = FetchRequest::get(Self::search_url(query)).cache_key(format!("defra-{query}"));
        let resp = send(SOURCE, self.fetcher.as_ref(), req).await?;
        ensure_success(SOURCE, &resp)?;

        let t0 = std::time::Instant::now();
        let out = Self::normalize(&resp.text())?;
        record_normalized(SOURCE, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
