// src/ingest/types.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Which protocol a candidate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    #[serde(rename = "nvd")]
    StructuredDb,
    #[serde(rename = "rss")]
    Feed,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::StructuredDb => "nvd",
            SourceKind::Feed => "rss",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nvd" => Ok(SourceKind::StructuredDb),
            "rss" => Ok(SourceKind::Feed),
            other => Err(format!("unknown source kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    News,
    Vulnerability,
    Threat,
    Tutorial,
    Analysis,
    Alert,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Vulnerability => "vulnerability",
            Category::Threat => "threat",
            Category::Tutorial => "tutorial",
            Category::Analysis => "analysis",
            Category::Alert => "alert",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(Category::News),
            "vulnerability" => Ok(Category::Vulnerability),
            "threat" => Ok(Category::Threat),
            "tutorial" => Ok(Category::Tutorial),
            "analysis" => Ok(Category::Analysis),
            "alert" => Ok(Category::Alert),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed CVSS banding: >= 9.0 critical, >= 7.0 high, >= 4.0 medium, else low.
    pub fn from_base_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Scalar value allowed in the per-source extension map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

/// Source-specific extras.
///
/// Keys written by the vulnerability-database adapter: `cvssScore` (number),
/// `cvssVector` (text), `cvssVersion` (text). Feed adapters write none.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A normalized article before persistence. `url` is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCandidate {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub url: String,
    pub source: SourceKind,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub cve_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A stored article: the candidate plus its storage identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedArticle {
    pub id: i64,
    #[serde(flatten)]
    pub article: ArticleCandidate,
}

/// Result of one persistence pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistOutcome {
    pub stored: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    Fetched { candidates: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// `stored + skipped == fetched`; failed sources add nothing to `fetched`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTotals {
    pub fetched: usize,
    pub stored: usize,
    pub skipped: usize,
}

/// Summary of one complete fetch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchRun {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sources: Vec<SourceReport>,
    pub totals: RunTotals,
}

impl FetchRun {
    pub fn summary(&self) -> FetchSummary {
        FetchSummary {
            stored: self.totals.stored,
            skipped: self.totals.skipped,
            total: self.totals.fetched,
        }
    }
}

/// What collaborators see from `run_fetch_cycle`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchSummary {
    pub stored: usize,
    pub skipped: usize,
    pub total: usize,
}

/// One source of candidate articles.
///
/// Implementations return `FetchError` on any network/timeout/parse failure; the
/// orchestrator turns that into an empty contribution for the source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch up to `limit` candidates (`None` means the adapter's configured default).
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<ArticleCandidate>, FetchError>;

    /// Display name used in logs and run reports.
    fn name(&self) -> &str;
}
