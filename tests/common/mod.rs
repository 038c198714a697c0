// tests/common/mod.rs
//
// Shared test doubles: canned adapters and a fixture-backed Fetcher.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog_aggregator::aggregate::http::{FetchRequest, FetchResponse, Fetcher, TransportError};
use catalog_aggregator::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

pub fn fixture(name: &str) -> String {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&p).unwrap_or_else(|e| panic!("fixture {}: {e}", p.display()))
}

pub fn listing(source: &str, n: usize) -> CanonicalListing {
    CanonicalListing {
        id: format!("{source}-{n}"),
        title: format!("{source} dataset {n}"),
        description: String::new(),
        subtitle: String::new(),
        provider: ListingProvider::default(),
        url: format!("https://example.org/{source}/{n}"),
        source: source.to_string(),
        updated: "unknown".to_string(),
    }
}

/// Returns `count` listings after an optional delay, or a fixed failure.
pub struct CannedAdapter {
    pub name: &'static str,
    pub count: usize,
    pub delay: Duration,
    pub fail_with: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl CannedAdapter {
    pub fn ok(name: &'static str, count: usize) -> Self {
        Self {
            name,
            count,
            delay: Duration::ZERO,
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::ok(name, 0)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for CannedAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        self.calls.lock().unwrap().push(query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(msg) = &self.fail_with {
            return Err(AdapterError::Transport {
                source_name: self.name,
                message: msg.clone(),
            });
        }
        Ok((0..self.count).map(|i| listing(self.name, i)).collect())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// URL-prefix routed Fetcher; first match wins, unmatched URLs fail as transport errors.
#[derive(Default)]
pub struct FixtureFetcher {
    routes: Vec<(String, FetchResponse)>,
    seen: Mutex<Vec<FetchRequest>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, resp: FetchResponse) -> Self {
        self.routes.push((prefix.to_string(), resp));
        self
    }

    pub fn seen(&self) -> Vec<FetchRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, req: FetchRequest) -> Result<FetchResponse, TransportError> {
        let url = req.url.clone();
        self.seen.lock().unwrap().push(req);
        self.routes
            .iter()
            .find(|(p, _)| url.starts_with(p.as_str()))
            .map(|(_, r)| r.clone())
            .ok_or_else(|| TransportError(format!("connection refused: {url}")))
    }
}
