// src/ingest/providers/feed.rs
//! Syndication feed adapters.
//!
//! `FeedAdapter` parses with the primary strategy and hands the same document to
//! `FallbackFeedAdapter` only when that parse fails. When the primary strategy is not
//! available at all, the pipeline uses `FallbackFeedAdapter` directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};

use crate::config::FeedSource;
use crate::error::FetchError;
use crate::ingest::excerpt;
use crate::ingest::extract::extract;
use crate::ingest::parsing::{FeedItem, FeedParsingStrategy, PatternFeedParser, SharedStrategy};
use crate::ingest::providers::get_text;
use crate::ingest::types::{ArticleCandidate, Category, SourceAdapter, SourceKind};

/// Normalize one feed item for `source`.
///
/// A CVE mention anywhere in title or body forces `Category::Vulnerability`.
pub fn candidate_from_item(
    item: FeedItem,
    source: &FeedSource,
    fetched_at: DateTime<Utc>,
) -> ArticleCandidate {
    let title = item.title.unwrap_or_else(|| "Untitled".to_string());
    let content = item.body.unwrap_or_default();
    let found = extract(&format!("{title} {content}"));

    let category = if found.cve_ids.is_empty() {
        source.category
    } else {
        Category::Vulnerability
    };

    ArticleCandidate {
        excerpt: excerpt(&content),
        url: item.link.unwrap_or_else(|| source.url.clone()),
        source: SourceKind::Feed,
        source_name: source.source_name.clone(),
        published_at: item.published_at.unwrap_or(fetched_at),
        fetched_at,
        category,
        tags: found.tags,
        cve_ids: found.cve_ids,
        severity: None,
        image_url: item.image_url,
        metadata: None,
        title,
        content,
    }
}

/// Pattern-matching adapter for one feed.
pub struct FallbackFeedAdapter {
    source: FeedSource,
    client: reqwest::Client,
    item_limit: usize,
}

impl FallbackFeedAdapter {
    pub fn new(source: FeedSource, client: reqwest::Client, item_limit: usize) -> Self {
        Self {
            source,
            client,
            item_limit,
        }
    }

    /// Scrape an already downloaded document.
    pub fn recover(&self, document: &str, limit: usize) -> Result<Vec<ArticleCandidate>, FetchError> {
        let items = PatternFeedParser
            .parse(document, limit)
            .map_err(|e| FetchError::parse(&self.source.source_name, e))?;
        let now = Utc::now();
        Ok(items
            .into_iter()
            .map(|it| candidate_from_item(it, &self.source, now))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for FallbackFeedAdapter {
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<ArticleCandidate>, FetchError> {
        let body = get_text(&self.client, &self.source.url, &self.source.source_name).await?;
        self.recover(&body, limit.unwrap_or(self.item_limit))
    }

    fn name(&self) -> &str {
        &self.source.source_name
    }
}

/// Feed adapter backed by the primary parsing strategy.
pub struct FeedAdapter {
    primary: SharedStrategy,
    fallback: FallbackFeedAdapter,
}

impl FeedAdapter {
    pub fn new(
        source: FeedSource,
        client: reqwest::Client,
        item_limit: usize,
        primary: SharedStrategy,
    ) -> Self {
        Self {
            primary,
            fallback: FallbackFeedAdapter::new(source, client, item_limit),
        }
    }

    pub fn source(&self) -> &FeedSource {
        &self.fallback.source
    }

    /// Parse a document: primary strategy first, pattern scraping only if it fails.
    pub fn parse_document(&self, document: &str, limit: usize) -> Result<Vec<ArticleCandidate>, FetchError> {
        let source = self.source();
        match self.primary.parse(document, limit) {
            Ok(items) => {
                let now = Utc::now();
                Ok(items
                    .into_iter()
                    .map(|it| candidate_from_item(it, source, now))
                    .collect())
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    source = %source.source_name,
                    parser = self.primary.name(),
                    error = %e,
                    "primary feed parser failed, trying pattern fallback"
                );
                counter!("ingest_fallback_parses_total", "source" => source.source_name.clone())
                    .increment(1);
                self.fallback.recover(document, limit)
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<ArticleCandidate>, FetchError> {
        let t0 = std::time::Instant::now();
        let source = self.source();
        let body = get_text(&self.fallback.client, &source.url, &source.source_name).await?;
        let out = self.parse_document(&body, limit.unwrap_or(self.fallback.item_limit))?;

        histogram!("ingest_fetch_ms", "source" => "rss").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(target: "ingest", source = %source.source_name, count = out.len(), "feed fetched");
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.fallback.source.source_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(category: Category) -> FeedSource {
        FeedSource::new("https://feed.example/rss", "Example", category)
    }

    #[test]
    fn cve_mention_overrides_default_category() {
        let item = FeedItem {
            title: Some("Patch Tuesday fixes cve-2024-21412".into()),
            link: Some("https://feed.example/a".into()),
            body: Some("Microsoft shipped fixes.".into()),
            ..Default::default()
        };
        let c = candidate_from_item(item, &src(Category::Threat), Utc::now());
        assert_eq!(c.category, Category::Vulnerability);
        assert_eq!(c.cve_ids, vec!["CVE-2024-21412"]);
        assert!(c.tags.contains("patch"));
        assert_eq!(c.source, SourceKind::Feed);
        assert_eq!(c.severity, None);
    }

    #[test]
    fn missing_fields_get_fallbacks() {
        let now = Utc::now();
        let c = candidate_from_item(FeedItem::default(), &src(Category::News), now);
        assert_eq!(c.title, "Untitled");
        assert_eq!(c.url, "https://feed.example/rss");
        assert_eq!(c.published_at, now);
        assert_eq!(c.category, Category::News);
        assert!(c.cve_ids.is_empty());
    }

    #[test]
    fn excerpt_is_capped() {
        let item = FeedItem {
            title: Some("Long".into()),
            link: Some("https://feed.example/long".into()),
            body: Some("x".repeat(500)),
            ..Default::default()
        };
        let c = candidate_from_item(item, &src(Category::News), Utc::now());
        assert_eq!(c.excerpt.len(), 200);
        assert_eq!(c.content.len(), 500);
    }
}
