// src/aggregate/providers/agrimetrics.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_json, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{first_present, format_updated, join_list, null_as_default};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "Agrimetrics";
pub const CATALOG_URL: &str =
    "https://app.agrimetrics.co.uk/backend/catalog/api/catalog/data-sets";
const PROVIDER_DESCRIPTION: &str = "Agrimetrics Data Marketplace";
const PAGE_LIMIT: &str = "13";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgrimetricsResponse {
    data_sets: Option<Vec<AgrimetricsDataSet>>,
}

#[derive(Debug, Deserialize)]
struct AgrimetricsDataSet {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    title: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    creator: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    distributions: Vec<Distribution>,
    modified: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Distribution {
    #[serde(rename = "accessURL")]
    access_url: Option<String>,
    #[serde(rename = "downloadURL")]
    download_url: Option<String>,
}

pub struct AgrimetricsAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl AgrimetricsAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fixed parameter set; only `extendedText` varies. Form-encoded (space → `+`).
    pub fn search_url(query: &str) -> String {
        let params = [
            ("exchange", "agrimetrics"),
            ("tagRelationship", "narrower"),
            ("extendedText", query),
            ("onlyFeatured", "false"),
            ("onlyOwned", "false"),
            ("showHidden", "false"),
            ("showEditable", "false"),
            ("identities", "PUBLIC"),
            ("offset", "0"),
            ("limit", PAGE_LIMIT),
            ("sort", "relevance"),
        ];
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{CATALOG_URL}?{encoded}")
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: AgrimetricsResponse = parse_json(SOURCE, body)?;
        let sets = data
            .data_sets
            .ok_or_else(|| AdapterError::shape(SOURCE, "dataSets"))?;

        Ok(sets
            .into_iter()
            .map(|d| {
                let first = d.distributions.first();
                let url = first_present(
                    [
                        first.and_then(|x| x.access_url.as_deref()),
                        first.and_then(|x| x.download_url.as_deref()),
                    ],
                    || format!("https://app.agrimetrics.co.uk/datasets/{}", d.id),
                );
                CanonicalListing {
                    title: d.title.unwrap_or_default(),
                    description: d.description.unwrap_or_default(),
                    subtitle: join_list(&d.tags),
                    provider: ListingProvider {
                        title: d.creator.unwrap_or_default(),
                        description: PROVIDER_DESCRIPTION.to_string(),
                    },
                    url,
                    source: SOURCE.to_string(),
                    updated: format_updated(d.modified.as_deref()),
                    id: d.id,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for AgrimetricsAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let req = FetchRequest::get(Self::search_url(query))
            .header("Accept", "application/json")
            .cache_key(format!("agrimetrics-{query}"));
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
