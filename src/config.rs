// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const ENV_ADAPTER_TIMEOUT_MS: &str = "AGGREGATOR_ADAPTER_TIMEOUT_MS";
pub const ENV_ENABLED_SOURCES: &str = "AGGREGATOR_ENABLED_SOURCES";

const DEFAULT_TOML_PATH: &str = "config/aggregator.toml";
const DEFAULT_JSON_PATH: &str = "config/aggregator.json";

/// Runtime knobs for the aggregation pipeline. Every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Budget for one adapter, all of its requests included.
    pub adapter_timeout_ms: u64,
    /// Total timeout for a single upstream HTTP request.
    pub http_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
    pub cache_max_entries: usize,
    /// Source names to run (case-insensitive). Empty means all.
    pub enabled_sources: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: 10_000,
            http_timeout_ms: 8_000,
            connect_timeout_ms: 4_000,
            user_agent: "catalog-aggregator/0.1".to_string(),
            cache_max_entries: 1_000,
            enabled_sources: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    pub fn is_source_enabled(&self, source: &str) -> bool {
        self.enabled_sources.is_empty()
            || self
                .enabled_sources
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(source))
    }

    /// Load from an explicit path. TOML or JSON, picked by extension (content sniffed otherwise).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing aggregator config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $AGGREGATOR_CONFIG_PATH (must exist)
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::load_file_default()?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn load_file_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_JSON_PATH);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_ADAPTER_TIMEOUT_MS) {
            self.adapter_timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_ADAPTER_TIMEOUT_MS}={raw:?} is not a number"))?;
            if self.adapter_timeout_ms == 0 {
                return Err(anyhow!("{ENV_ADAPTER_TIMEOUT_MS} must be > 0"));
            }
        }
        if let Ok(raw) = std::env::var(ENV_ENABLED_SOURCES) {
            self.enabled_sources = clean_list(raw.split(','));
        }
        Ok(())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AggregatorConfig> {
    let cfg: AggregatorConfig = match hint_ext {
        "toml" => toml::from_str(s)?,
        "json" => serde_json::from_str(s)?,
        _ if s.trim_start().starts_with('{') => serde_json::from_str(s)?,
        _ => toml::from_str(s)?,
    };
    if cfg.adapter_timeout_ms == 0 {
        return Err(anyhow!("adapter_timeout_ms must be > 0"));
    }
    Ok(AggregatorConfig {
        enabled_sources: clean_list(cfg.enabled_sources.iter()),
        ..cfg
    })
}

fn clean_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.as_ref().trim();
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}
