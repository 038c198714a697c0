// src/aggregate/providers/datarade.rs
//! Datarade product search. No API and no embedded data: results are scraped from the
//! rendered product cards, so the selector set is pinned as a versioned [`CardContract`].

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{ensure_success, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{collapse_whitespace, encode_component, UNKNOWN_UPDATED};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub const SOURCE: &str = "Datarade";
pub const BASE_URL: &str = "https://datarade.ai/";
pub const SEARCH_URL: &str = "https://datarade.ai/search/products";
const PROVIDER_TITLE: &str = "Datarade";
const PROVIDER_DESCRIPTION: &str = "Datarade Data Marketplace";

/// CSS selectors describing one product card. Bump `version` whenever a selector changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardContract {
    pub version: u32,
    pub card: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub body: &'static str,
    pub link: &'static str,
}

pub const CARD_CONTRACT: CardContract = CardContract {
    version: 1,
    card: "div.product-card",
    title: ".product-card__title",
    subtitle: ".product-card__subtitle",
    body: ".product-card__description",
    link: "a.product-card__link[href]",
};

struct CompiledContract {
    card: Selector,
    title: Selector,
    subtitle: Selector,
    body: Selector,
    link: Selector,
}

impl CompiledContract {
    fn compile(c: &CardContract) -> Self {
        let sel = |s: &str| Selector::parse(s).expect("card contract selector");
        Self {
            card: sel(c.card),
            title: sel(c.title),
            subtitle: sel(c.subtitle),
            body: sel(c.body),
            link: sel(c.link),
        }
    }
}

static COMPILED: Lazy<CompiledContract> = Lazy::new(|| CompiledContract::compile(&CARD_CONTRACT));

fn text_of(card: &ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

pub struct DataradeAdapter {
    fetcher: Arc<dyn Fetcher>,
}

impl DataradeAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn search_url(query: &str) -> String {
        format!("{SEARCH_URL}?keywords={}", encode_component(query))
    }

    /// Apply the card contract to a results page. Pages without cards yield no listings.
    pub fn parse_cards(html: &str, search_url: &str) -> Vec<CanonicalListing> {
        let doc = Html::parse_document(html);
        let c = &*COMPILED;
        let base = Url::parse(BASE_URL).ok();

        doc.select(&c.card)
            .filter_map(|card| {
                let title = text_of(&card, &c.title);
                if title.is_empty() {
                    return None;
                }
                let url = card
                    .select(&c.link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::trim)
                    .filter(|href| !href.is_empty())
                    .and_then(|href| base.as_ref().and_then(|b| b.join(href).ok()))
                    .map(String::from)
                    .unwrap_or_else(|| search_url.to_string());

                Some(CanonicalListing {
                    id: url.clone(),
                    title,
                    description: text_of(&card, &c.body),
                    subtitle: text_of(&card, &c.subtitle),
                    provider: ListingProvider {
                        title: PROVIDER_TITLE.to_string(),
                        description: PROVIDER_DESCRIPTION.to_string(),
                    },
                    url,
                    source: SOURCE.to_string(),
                    updated: UNKNOWN_UPDATED.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for DataradeAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let url = Self::search_url(query);
        let req = FetchRequest::get(url.as_str())
            .header("Accept", "text/html")
            .cache_key(format!("datarade-{query}"));
        let resp = send(SOURCE, self.fetcher.as_ref(), req).await?;
        ensure_success(SOURCE, &resp)?;

        let t0 = std::time::Instant::now();
        let out = Self::parse_cards(&resp.text(), &url);
        if out.is_empty() {
            tracing::debug!(target: "aggregate", source = SOURCE, version = CARD_CONTRACT.version, "no product cards matched");
        }
        record_normalized(SOURCE, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        SOURCE
    }
}
