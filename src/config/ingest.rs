// src/config/ingest.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::types::Category;

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const ENV_INTERVAL_MINUTES: &str = "NEWS_FETCH_INTERVAL_MINUTES";
pub const ENV_TIMEOUT_MS: &str = "FETCH_TIMEOUT_MS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_NVD_API_KEY: &str = "NVD_API_KEY";

pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;
/// Longest accepted schedule interval (one week); larger values fall back to the default.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FEED_ITEM_LIMIT: usize = 20;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;

fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_feed_item_limit() -> usize {
    DEFAULT_FEED_ITEM_LIMIT
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_database_url() -> String {
    "sqlite:data/news.db?mode=rwc".to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_nvd_base_url() -> String {
    "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string()
}
fn default_results_per_page() -> usize {
    30
}

/// One syndication feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub url: String,
    pub source_name: String,
    /// Default category; CVE mentions override it with `vulnerability`.
    #[serde(default)]
    pub category: Category,
}

impl FeedSource {
    pub fn new(url: &str, source_name: &str, category: Category) -> Self {
        Self {
            url: url.to_string(),
            source_name: source_name.to_string(),
            category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NvdSettings {
    #[serde(default = "default_nvd_base_url")]
    pub base_url: String,
    #[serde(default = "default_results_per_page")]
    pub results_per_page: usize,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for NvdSettings {
    fn default() -> Self {
        Self {
            base_url: default_nvd_base_url(),
            results_per_page: default_results_per_page(),
            start_index: 0,
            api_key: None,
        }
    }
}

/// Static pipeline configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_timeout_ms")]
    pub per_call_timeout_ms: u64,
    #[serde(default = "default_feed_item_limit")]
    pub feed_item_limit: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub nvd: NvdSettings,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            per_call_timeout_ms: DEFAULT_TIMEOUT_MS,
            feed_item_limit: DEFAULT_FEED_ITEM_LIMIT,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            database_url: default_database_url(),
            bind_addr: default_bind_addr(),
            nvd: NvdSettings::default(),
            feeds: default_feeds(),
        }
    }
}

impl IngestConfig {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Apply env overrides and replace out-of-range values with defaults.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_positive_env(ENV_INTERVAL_MINUTES) {
            self.interval_minutes = v;
        }
        if let Some(v) = parse_positive_env(ENV_TIMEOUT_MS) {
            self.per_call_timeout_ms = v;
        }
        if let Some(v) = non_empty_env(ENV_DATABASE_URL) {
            self.database_url = v;
        }
        if let Some(v) = non_empty_env(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = non_empty_env(ENV_NVD_API_KEY) {
            self.nvd.api_key = Some(v);
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if self.interval_minutes == 0 || self.interval_minutes > MAX_INTERVAL_MINUTES {
            self.interval_minutes = DEFAULT_INTERVAL_MINUTES;
        }
        if self.per_call_timeout_ms == 0 {
            self.per_call_timeout_ms = DEFAULT_TIMEOUT_MS;
        }
        if self.feed_item_limit == 0 {
            self.feed_item_limit = DEFAULT_FEED_ITEM_LIMIT;
        }
        if self.nvd.results_per_page == 0 {
            self.nvd.results_per_page = default_results_per_page();
        }
        self.feeds.retain(|f| !f.url.trim().is_empty());
        self
    }
}

/// The security news feeds polled when no feed list is configured.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("https://krebsonsecurity.com/feed/", "Krebs on Security", Category::News),
        FeedSource::new("https://feeds.feedburner.com/Securityweek", "SecurityWeek", Category::News),
        FeedSource::new("https://www.darkreading.com/rss.xml", "Dark Reading", Category::News),
        FeedSource::new("https://www.bleepingcomputer.com/feed/", "BleepingComputer", Category::News),
        FeedSource::new("https://threatpost.com/feed/", "Threatpost", Category::Threat),
        FeedSource::new("https://feeds.feedburner.com/TheHackersNews", "The Hacker News", Category::News),
        FeedSource::new("https://securityaffairs.co/wordpress/feed", "Security Affairs", Category::News),
    ]
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<IngestConfig> {
    let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/ingest.toml");
        let json_p = PathBuf::from("config/ingest.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            IngestConfig::default()
        }
    };
    Ok(base.with_env_overrides())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: JSON documents start with '{'.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive_env(name: &str) -> Option<u64> {
    non_empty_env(name)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_fill_defaults() {
        let toml = r#"
interval_minutes = 15

[[feeds]]
url = "https://a.example/feed"
source_name = "A"
category = "threat"
"#;
        let cfg = parse_config(toml, "toml").unwrap();
        assert_eq!(cfg.interval_minutes, 15);
        assert_eq!(cfg.per_call_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(cfg.feeds.len(), 1);
        assert_eq!(cfg.feeds[0].category, Category::Threat);

        let json = r#"{"feeds": [{"url": "https://b.example/rss", "source_name": "B"}]}"#;
        let cfg = parse_config(json, "").unwrap();
        assert_eq!(cfg.interval_minutes, DEFAULT_INTERVAL_MINUTES);
        assert_eq!(cfg.feeds[0].category, Category::News);
    }

    #[test]
    fn missing_feed_list_uses_defaults() {
        let cfg = parse_config("interval_minutes = 5", "toml").unwrap();
        assert_eq!(cfg.feeds, default_feeds());
        assert_eq!(cfg.feeds.len(), 7);
    }

    #[test]
    fn zero_values_are_sanitized() {
        let cfg = IngestConfig {
            interval_minutes: 0,
            per_call_timeout_ms: 0,
            feed_item_limit: 0,
            ..IngestConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.interval_minutes, 60);
        assert_eq!(cfg.per_call_timeout_ms, 10_000);
        assert_eq!(cfg.feed_item_limit, 20);
    }

    #[test]
    fn oversized_interval_falls_back_to_default() {
        let cfg = IngestConfig {
            interval_minutes: u64::MAX / 2,
            ..IngestConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.interval_minutes, DEFAULT_INTERVAL_MINUTES);

        let week = IngestConfig {
            interval_minutes: MAX_INTERVAL_MINUTES,
            ..IngestConfig::default()
        }
        .sanitized();
        assert_eq!(week.interval_minutes, MAX_INTERVAL_MINUTES);
    }
}
