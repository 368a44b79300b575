// src/ingest/providers/nvd.rs
//! Vulnerability-database adapter for the NVD CVE API 2.0.
//! https://nvd.nist.gov/developers/vulnerabilities

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::Deserialize;

use crate::config::NvdSettings;
use crate::error::FetchError;
use crate::ingest::extract::{extract_cve_ids, extract_tags};
use crate::ingest::types::{
    ArticleCandidate, Category, Metadata, MetadataValue, Severity, SourceAdapter, SourceKind,
};
use crate::ingest::{excerpt, parse_timestamp};

pub const NVD_SOURCE_NAME: &str = "NVD (National Vulnerability Database)";
pub const NVD_DETAIL_URL: &str = "https://nvd.nist.gov/vuln/detail/";

/// Main JSON object returned by the CVE API. Only the fields we use.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
pub struct Vulnerability {
    pub cve: CveRecord,
}

#[derive(Debug, Deserialize)]
pub struct CveRecord {
    /// Example: CVE-2012-6708
    #[serde(default)]
    pub id: String,
    /// Example: 2018-01-18T23:29:00.213 (no zone; UTC)
    pub published: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<LangString>,
    #[serde(default)]
    pub metrics: CveMetrics,
    #[serde(default)]
    pub weaknesses: Vec<Weakness>,
}

#[derive(Debug, Deserialize)]
pub struct LangString {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CveMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    pub cvss_metric_v31: Vec<CvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    pub cvss_metric_v30: Vec<CvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    pub cvss_metric_v2: Vec<CvssMetric>,
}

#[derive(Debug, Deserialize)]
pub struct CvssMetric {
    #[serde(rename = "cvssData")]
    pub cvss_data: CvssData,
}

#[derive(Debug, Deserialize)]
pub struct CvssData {
    pub version: Option<String>,
    #[serde(rename = "vectorString")]
    pub vector_string: Option<String>,
    #[serde(rename = "baseScore")]
    pub base_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Weakness {
    #[serde(default)]
    pub description: Vec<LangString>,
}

impl CveMetrics {
    /// Primary metric: first v3.1 entry, then v3.0, then v2, skipping entries without a score.
    fn primary(&self) -> Option<&CvssData> {
        [
            &self.cvss_metric_v31,
            &self.cvss_metric_v30,
            &self.cvss_metric_v2,
        ]
        .into_iter()
        .filter_map(|list| list.first())
        .map(|m| &m.cvss_data)
        .find(|d| d.base_score.is_some())
    }
}

/// Normalize one CVE record. Records without an id are dropped.
pub fn record_to_candidate(cve: CveRecord, fetched_at: DateTime<Utc>) -> Option<ArticleCandidate> {
    let id = cve.id.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let content = cve
        .descriptions
        .iter()
        .find(|d| d.lang.eq_ignore_ascii_case("en"))
        .or_else(|| cve.descriptions.first())
        .map(|d| d.value.trim().to_string())
        .unwrap_or_default();

    let primary = cve.metrics.primary();
    let severity = primary
        .and_then(|d| d.base_score)
        .map(Severity::from_base_score);

    let metadata = primary.map(|d| {
        let mut m = Metadata::new();
        if let Some(score) = d.base_score {
            m.insert("cvssScore".to_string(), MetadataValue::Number(score));
        }
        if let Some(vector) = &d.vector_string {
            m.insert("cvssVector".to_string(), MetadataValue::Text(vector.clone()));
        }
        if let Some(version) = &d.version {
            m.insert("cvssVersion".to_string(), MetadataValue::Text(version.clone()));
        }
        m
    });

    let text = format!("{id} {content}");
    let mut tags: BTreeSet<String> = ["cve", "vulnerability"]
        .into_iter()
        .map(String::from)
        .collect();
    tags.extend(
        cve.weaknesses
            .iter()
            .flat_map(|w| w.description.iter())
            .map(|d| d.value.trim().to_lowercase())
            .filter(|v| !v.is_empty()),
    );
    tags.extend(extract_tags(&text));

    Some(ArticleCandidate {
        excerpt: excerpt(&content),
        url: format!("{NVD_DETAIL_URL}{id}"),
        source: SourceKind::StructuredDb,
        source_name: NVD_SOURCE_NAME.to_string(),
        published_at: cve
            .published
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fetched_at),
        fetched_at,
        category: Category::Vulnerability,
        tags,
        cve_ids: extract_cve_ids(&text),
        severity,
        image_url: None,
        metadata,
        title: id,
        content,
    })
}

/// Pulls one page of recent CVEs.
pub struct NvdAdapter {
    client: reqwest::Client,
    settings: NvdSettings,
}

impl NvdAdapter {
    pub fn new(client: reqwest::Client, settings: NvdSettings) -> Self {
        Self { client, settings }
    }

    /// Parse a raw API body. Exposed for fixtures.
    pub fn parse_response(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<ArticleCandidate>, FetchError> {
        let resp: ApiResponse =
            serde_json::from_str(body).map_err(|e| FetchError::parse(NVD_SOURCE_NAME, e))?;
        Ok(resp
            .vulnerabilities
            .into_iter()
            .filter_map(|v| record_to_candidate(v.cve, fetched_at))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for NvdAdapter {
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<ArticleCandidate>, FetchError> {
        let t0 = std::time::Instant::now();
        let page = limit.unwrap_or(self.settings.results_per_page).max(1);

        let mut req = self.client.get(&self.settings.base_url).query(&[
            ("resultsPerPage", page.to_string()),
            ("startIndex", self.settings.start_index.to_string()),
        ]);
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("apiKey", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(NVD_SOURCE_NAME, &e))?
            .error_for_status()
            .map_err(|e| FetchError::from_reqwest(NVD_SOURCE_NAME, &e))?;
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(NVD_SOURCE_NAME, &e))?;

        let mut out = Self::parse_response(&body, Utc::now())?;
        out.truncate(page);

        histogram!("ingest_fetch_ms", "source" => "nvd").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(target: "ingest", source = NVD_SOURCE_NAME, count = out.len(), "nvd page fetched");
        Ok(out)
    }

    fn name(&self) -> &str {
        NVD_SOURCE_NAME
    }
}
