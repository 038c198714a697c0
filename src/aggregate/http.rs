// src/aggregate/http.rs
//! Transport seam for adapters: a small request/response model, the `Fetcher` trait,
//! and the production `HttpFetcher` (reqwest + in-memory response cache).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use thiserror::Error;
use tracing::debug;

use crate::config::AggregatorConfig;

/// Upstream cache policy: two weeks for success.
pub const CACHE_TTL_SUCCESS_SECS: u64 = 1_209_600;
pub const CACHE_TTL_NOT_FOUND_SECS: u64 = 1;

/// TTL by upstream status class. `None` means "do not cache".
pub fn cache_ttl_for_status(status: u16) -> Option<Duration> {
    match status {
        200..=299 => Some(Duration::from_secs(CACHE_TTL_SUCCESS_SECS)),
        404 => Some(Duration::from_secs(CACHE_TTL_NOT_FOUND_SECS)),
        _ => None, // 5xx never cached; other classes are not worth keeping either
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Query-specific for searchable providers, fixed for static catalogues,
    /// `None` to bypass caching entirely.
    pub cache_key: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            cache_key: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
            cache_key: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, Some("application/json; charset=utf-8"), body)
    }

    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, Some("text/html; charset=utf-8"), body)
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(needle))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: FetchRequest) -> Result<FetchResponse, TransportError>;
}

/* ----------------------------
Response cache
---------------------------- */

struct CachedResponse {
    response: FetchResponse,
    inserted_at: Instant,
    ttl: Duration,
}

/// Keyed response cache with per-entry TTL derived from the upstream status.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn digest(key: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<FetchResponse> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(&Self::digest(key))?;
        if entry.inserted_at.elapsed() >= entry.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Store `response` if its status class is cacheable. Returns whether it was stored.
    pub fn insert(&self, key: &str, response: &FetchResponse) -> bool {
        let Some(ttl) = cache_ttl_for_status(response.status) else {
            return false;
        };
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };

        entries.retain(|_, e| e.inserted_at.elapsed() < e.ttl);
        if entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            }
        }

        entries.insert(
            Self::digest(key),
            CachedResponse {
                response: response.clone(),
                inserted_at: Instant::now(),
                ttl,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/* ----------------------------
Production fetcher
---------------------------- */

pub struct HttpFetcher {
    client: reqwest::Client,
    cache: ResponseCache,
}

impl HttpFetcher {
    pub fn from_config(cfg: &AggregatorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.http_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            cache: ResponseCache::new(cfg.cache_max_entries),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: FetchRequest) -> Result<FetchResponse, TransportError> {
        if let Some(key) = req.cache_key.as_deref() {
            if let Some(hit) = self.cache.get(key) {
                debug!(target: "aggregate", url = %req.url, "response cache hit");
                return Ok(hit);
            }
        }

        let mut builder = self.client.request(req.method.clone(), req.url.as_str());
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError(format!("timeout: {e}"))
            } else {
                TransportError(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError(format!("reading body: {e}")))?
            .to_vec();

        let out = FetchResponse {
            status,
            content_type,
            body,
        };
        if let Some(key) = req.cache_key.as_deref() {
            self.cache.insert(key, &out);
        }
        Ok(out)
    }
}

/* ----------------------------
Test double
---------------------------- */
