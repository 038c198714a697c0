// src/aggregate/normalize.rs
//! Shared normalization helpers: timestamp display format, list joining,
//! case-insensitive matching, embedded `__NEXT_DATA__` extraction, URL encoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Shown when a provider exposes no usable modification time.
pub const UNKNOWN_UPDATED: &str = "unknown";

const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Timestamps arrive as ISO strings, epoch-millis strings, or epoch-millis numbers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_display(&self) -> String {
        match self {
            RawTimestamp::Millis(ms) => format_epoch_millis(*ms),
            RawTimestamp::Float(ms) if ms.is_finite() => format_epoch_millis(ms.trunc() as i64),
            RawTimestamp::Float(_) => UNKNOWN_UPDATED.to_string(),
            RawTimestamp::Text(s) => format_updated(Some(s)),
        }
    }
}

/// Field deserializer that maps an explicit JSON `null` to the type's default,
/// same as an absent key under `#[serde(default)]`.
pub fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

pub fn format_epoch_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_UPDATED.to_string())
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // CKAN style: no offset, optional fraction; treated as UTC
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a raw provider timestamp as `DD/MM/YYYY HH:MM` (UTC, 24h), or `"unknown"`.
pub fn format_updated(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN_UPDATED.to_string();
    };

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .map(format_epoch_millis)
            .unwrap_or_else(|_| UNKNOWN_UPDATED.to_string());
    }

    parse_utc(raw)
        .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_UPDATED.to_string())
}

/// Join list fields (tags, keywords, themes) as `"a, b"`, skipping blanks.
pub fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter_map(|s| {
            let t = s.as_ref().trim();
            (!t.is_empty()).then(|| t.to_string())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Collapse runs of whitespace and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-blank candidate, else `fallback`.
pub fn first_present<'a, I>(candidates: I, fallback: impl FnOnce() -> String) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

static RE_NEXT_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json"[^>]*>(.*?)</script>"#)
        .expect("next-data regex")
});

/// Body of the `__NEXT_DATA__` script block embedded by server-rendered pages.
pub fn extract_next_data(html: &str) -> Option<&str> {
    RE_NEXT_DATA
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Percent-encode a query component (space becomes `%20`, not `+`).
pub fn encode_component(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_strings_render_in_utc_display_format() {
        assert_eq!(format_updated(Some("2024-03-20T12:00:00Z")), "20/03/2024 12:00");
        assert_eq!(
            format_updated(Some("2024-03-20T12:05:00+01:00")),
            "20/03/2024 11:05"
        );
        assert_eq!(
            format_updated(Some("2024-01-01T09:07:03.123456")),
            "01/01/2024 09:07"
        );
        assert_eq!(format_updated(Some("2024-01-02")), "02/01/2024 00:00");
    }

    #[test]
    fn epoch_millis_string_and_number() {
        assert_eq!(format_updated(Some("1710000000000")), "09/03/2024 16:00");
        assert_eq!(
            RawTimestamp::Millis(1_710_000_000_000).to_display(),
            "09/03/2024 16:00"
        );
    }

    #[test]
    fn absent_or_garbage_is_unknown() {
        assert_eq!(format_updated(None), "unknown");
        assert_eq!(format_updated(Some("   ")), "unknown");
        assert_eq!(format_updated(Some("last tuesday")), "unknown");
    }

    #[test]
    fn join_list_skips_blanks() {
        assert_eq!(join_list(["x", "y"]), "x, y");
        assert_eq!(join_list(["", " a ", "b"]), "a, b");
        assert_eq!(join_list(Vec::<String>::new()), "");
    }

    #[test]
    fn next_data_block_is_found() {
        let html = r#"<html><script id="__NEXT_DATA__" type="application/json">{"buildId":"X"}</script></html>"#;
        assert_eq!(extract_next_data(html), Some(r#"{"buildId":"X"}"#));
        assert_eq!(extract_next_data("<html></html>"), None);
    }

    #[test]
    fn encode_component_matches_browser_rules() {
        assert_eq!(encode_component("test query"), "test%20query");
        assert_eq!(encode_component("\"a&b\""), "%22a%26b%22");
        assert_eq!(encode_component("café"), "caf%C3%A9");
    }

    #[test]
    fn null_as_default_treats_null_like_absent() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "null_as_default")]
            tags: Vec<String>,
        }
        let null: Row = serde_json::from_str(r#"{"tags":null}"#).unwrap();
        let absent: Row = serde_json::from_str("{}").unwrap();
        let set: Row = serde_json::from_str(r#"{"tags":["a"]}"#).unwrap();
        assert!(null.tags.is_empty());
        assert!(absent.tags.is_empty());
        assert_eq!(set.tags, vec!["a"]);
    }

    #[test]
    fn first_present_walks_the_chain() {
        let out = first_present([None, Some("  "), Some("b")], || "z".into());
        assert_eq!(out, "b");
        let out = first_present([None, None], || "z".into());
        assert_eq!(out, "z");
    }
}
