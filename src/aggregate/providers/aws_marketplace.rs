// src/aggregate/providers/aws_marketplace.rs
//! AWS Marketplace discovery API. Requests are an `x-amz-json-1.1` envelope wrapping a
//! stringified search body; responses come back DEFLATE-compressed (zlib-wrapped or raw).

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{join_list, null_as_default, UNKNOWN_UPDATED};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "AWS Marketplace";
pub const DISCOVERY_URL: &str = "https://aws.amazon.com/marketplace/api/awsmpdiscovery";
const LISTING_URL_BASE: &str = "https://aws.amazon.com/marketplace/pp";
const TARGET: &str = "AWSMPDiscoveryService.SearchListings";
const INTEGRATION_ID: &str = "integ-wwgdgowb4gvzo";
const REGION: &str = "us-east-1";
const MAX_RESULTS: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchListingsResponse {
    listing_summaries: Option<Vec<ListingSummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListingSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    display_attributes: DisplayAttributes,
    #[serde(default, deserialize_with = "null_as_default")]
    categories: Vec<Category>,
    #[serde(default, deserialize_with = "null_as_default")]
    product_attributes: ProductAttributes,
    #[serde(default, deserialize_with = "null_as_default")]
    offer_summary: OfferSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DisplayAttributes {
    title: Option<String>,
    long_description: Option<String>,
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Category {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductAttributes {
    creator: Option<Creator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Creator {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OfferSummary {
    pricing_summary: Option<String>,
}

pub struct AwsMarketplaceAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl AwsMarketplaceAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// The outer body carries the search request as a JSON *string*.
    pub fn request_body(query: &str) -> String {
        let inner = json!({
            "SearchText": query,
            "MaxResults": MAX_RESULTS,
            "Filters": [],
            "Sort": { "SortBy": "RELEVANCE", "SortOrder": "DESCENDING" },
        });
        json!({
            "RequestContext": {
                "IntegrationId": INTEGRATION_ID,
                "Region": REGION,
            },
            "Body": inner.to_string(),
        })
        .to_string()
    }

    fn request(query: &str) -> FetchRequest {
        FetchRequest::post(DISCOVERY_URL, Self::request_body(query))
            .header("Accept", "application/json")
            .header("Accept-Encoding", "deflate, gzip")
            .header("Content-Type", "application/x-amz-json-1.1")
            .header("X-Amz-Target", TARGET)
            .cache_key(format!("aws-marketplace-{query}"))
    }

    fn listing_url(id: &str) -> String {
        format!("{LISTING_URL_BASE}/{id}")
    }

    fn normalize(body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let data: SearchListingsResponse = parse_json(SOURCE, body)?;
        let summaries = data
            .listing_summaries
            .ok_or_else(|| AdapterError::shape(SOURCE, "ListingSummaries"))?;

        Ok(summaries
            .into_iter()
            .map(|s| {
                let attrs = s.display_attributes;
                CanonicalListing {
                    url: Self::listing_url(&s.id),
                    title: attrs.title.unwrap_or_default(),
                    description: attrs
                        .long_description
                        .or(attrs.short_description)
                        .unwrap_or_default(),
                    subtitle: join_list(s.categories.into_iter().filter_map(|c| c.display_name)),
                    provider: ListingProvider {
                        title: s
                            .product_attributes
                            .creator
                            .and_then(|c| c.display_name)
                            .unwrap_or_default(),
                        description: s.offer_summary.pricing_summary.unwrap_or_default(),
                    },
                    source: SOURCE.to_string(),
                    updated: UNKNOWN_UPDATED.to_string(),
                    id: s.id,
                }
            })
            .collect())
    }
}

/// Upper bound on an inflated response body.
pub const MAX_INFLATED_BYTES: u64 = 16 * 1024 * 1024;

/// Inflate a response body. Plain JSON passes through; gzip is recognised by its magic;
/// otherwise zlib framing is tried first, then raw DEFLATE.
pub fn inflate(body: &[u8]) -> Result<Vec<u8>, AdapterError> {
    inflate_limited(body, MAX_INFLATED_BYTES)
}

fn inflate_limited(body: &[u8], limit: u64) -> Result<Vec<u8>, AdapterError> {
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        None => return Err(AdapterError::decode(SOURCE, "empty body")),
        Some(b'{') | Some(b'[') => return Ok(body.to_vec()),
        _ => {}
    }

    if body.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(body)
            .take(limit + 1)
            .read_to_end(&mut out)
            .map_err(|e| AdapterError::decode(SOURCE, format!("gzip: {e}")))?;
        return within_limit(out, limit);
    }

    let mut out = Vec::new();
    if ZlibDecoder::new(body)
        .take(limit + 1)
        .read_to_end(&mut out)
        .is_ok()
    {
        return within_limit(out, limit);
    }

    let mut out = Vec::new();
    DeflateDecoder::new(body)
        .take(limit + 1)
        .read_to_end(&mut out)
        .map_err(|e| AdapterError::decode(SOURCE, format!("deflate: {e}")))?;
    within_limit(out, limit)
}

fn within_limit(out: Vec<u8>, limit: u64) -> Result<Vec<u8>, AdapterError> {
    if out.len() as u64 > limit {
        return Err(AdapterError::decode(
            SOURCE,
            format!("inflated body exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}

#[async_trait]
impl ProviderAdapter for AwsMarketplaceAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let resp = send(SOURCE, self.fetcher.as_ref(), Self::request(query)).await?;
        ensure_success(SOURCE, &resp)?;
        let body = inflate(&resp.body)?;

        let t0 = std::time::Instant::now();
        let out = Self::normalize(&body)?;
        record_normalized(SOURCE, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
