// src/aggregate/providers/opendatasoft.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_json, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{encode_component, format_updated, join_list, null_as_default};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "OpenDataSoft";
pub const CATALOG_URL: &str = "https://data.opendatasoft.com/api/explore/v2.1/catalog/datasets";
const PROVIDER_DESCRIPTION: &str = "OpenDataSoft Data Platform";

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    results: Option<Vec<OdsDataset>>,
}

#[derive(Debug, Deserialize)]
struct OdsDataset {
    #[serde(default, deserialize_with = "null_as_default")]
    dataset_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    dataset_uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    metas: Metas,
}

#[derive(Debug, Default, Deserialize)]
struct Metas {
    #[serde(default, deserialize_with = "null_as_default")]
    default: DefaultMetas,
}

#[derive(Debug, Default, Deserialize)]
struct DefaultMetas {
    title: Option<String>,
    description: Option<String>,
    publisher: Option<String>,
    modified: Option<String>,
    theme: Option<Vec<String>>,
    keyword: Option<Vec<String>>,
}

pub struct OpenDataSoftAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl OpenDataSoftAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// ODSQL `where` clause with the query as a quoted full-text term.
    pub fn search_url(query: &str) -> String {
        format!(
            "{CATALOG_URL}?where={}&limit=20&offset=0&lang=en&timezone=UTC&include_links=false&include_app_metas=false",
            encode_component(&format!("\"{query}\""))
        )
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: CatalogResponse = parse_json(SOURCE, body)?;
        let results = data
            .results
            .ok_or_else(|| AdapterError::shape(SOURCE, "results"))?;

        Ok(results
            .into_iter()
            .map(|d| {
                let m = d.metas.default;
                let tags = m
                    .theme
                    .unwrap_or_default()
                    .into_iter()
                    .chain(m.keyword.unwrap_or_default());
                CanonicalListing {
                    id: d.dataset_uid,
                    title: m.title.unwrap_or_default(),
                    description: m.description.unwrap_or_default(),
                    subtitle: join_list(tags),
                    provider: ListingProvider {
                        title: m.publisher.unwrap_or_default(),
                        description: PROVIDER_DESCRIPTION.to_string(),
                    },
                    url: format!("https://data.opendatasoft.com/explore/dataset/{}", d.dataset_id),
                    source: SOURCE.to_string(),
                    updated: format_updated(m.modified.as_deref()),
                }
            })
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for OpenDataSoftAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let req = FetchRequest::get(Self::search_url(query))
            .header("Accept", "application/json")
            .cache_key(format!("opendatasoft-{query}"));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::http::testing::MockFetcher;
    use crate::aggregate::http::FetchResponse;

    const BODY: &str = r#"{
      "total_count": 1,
      "results": [{
        "dataset_id": "test-dataset",
        "dataset_uid": "test-uid",
        "metas": { "default": {
          "title": "Test Dataset",
          "description": "Test Description",
          "publisher": "Test Publisher",
          "modified": "2024-03-20T12:00:00Z",
          "theme": ["Environment"],
          "keyword": ["test", "data"]
        }}
      }]
    }"#;

    #[tokio::test]
    async fn builds_quoted_where_clause_and_maps_metas() {
        let mock = Arc::new(MockFetcher::new().route(CATALOG_URL, FetchResponse::json(BODY)));
        let out = OpenDataSoftAdapter::new(mock.clone())
            .search("test query")
            .await
            .unwrap();

        let req = &mock.requests()[0];
        assert_eq!(
            req.url,
            "https://data.opendatasoft.com/api/explore/v2.1/catalog/datasets?where=%22test%20query%22&limit=20&offset=0&lang=en&timezone=UTC&include_links=false&include_app_metas=false"
        );
        assert_eq!(req.cache_key.as_deref(), Some("opendatasoft-test query"));

        assert_eq!(
            out,
            vec![CanonicalListing {
                id: "test-uid".into(),
                title: "Test Dataset".into(),
                description: "Test Description".into(),
                subtitle: "Environment, test, data".into(),
                provider: ListingProvider {
                    title: "Test Publisher".into(),
                    description: "OpenDataSoft Data Platform".into(),
                },
                url: "https://data.opendatasoft.com/explore/dataset/test-dataset".into(),
                source: "OpenDataSoft".into(),
                updated: "20/03/2024 12:00".into(),
            }]
        );
    }

    #[tokio::test]
    async fn null_keyword_lists_are_tolerated() {
        let body = r#"{"results":[{"dataset_id":"a","dataset_uid":"u","metas":{"default":{"title":"A","theme":null,"keyword":["k"]}}}]}"#;
        let mock = Arc::new(MockFetcher::new().route(CATALOG_URL, FetchResponse::json(body)));
        let out = OpenDataSoftAdapter::new(mock).search("a").await.unwrap();
        assert_eq!(out[0].subtitle, "k");
        assert_eq!(out[0].updated, "unknown");
    }

    #[tokio::test]
    async fn missing_results_is_shape_error() {
        let mock = Arc::new(
            MockFetcher::new().route(CATALOG_URL, FetchResponse::json(r#"{"total_count":0}"#)),
        );
        let err = OpenDataSoftAdapter::new(mock).search("x").await.unwrap_err();
        assert_eq!(err.kind(), "shape");
    }

    #[tokio::test]
    async fn server_error_is_status_error() {
        let mock = Arc::new(MockFetcher::new().route(
            CATALOG_URL,
            FetchResponse::new(500, Some("application/json"), "{}"),
        ));
        let err = OpenDataSoftAdapter::new(mock).search("x").await.unwrap_err();
        assert!(err.to_string().starts_with("OpenDataSoft API error: Status 500"));
    }
}
