// src/ingest/parsing/mod.rs
//! Feed parsing strategies.
//!
//! The primary strategy is structured XML deserialization (cargo feature `xml-feeds`).
//! The pattern strategy scrapes raw markup with regexes and is used when the primary
//! one is compiled out or fails on a document.

pub mod pattern;
#[cfg(feature = "xml-feeds")]
pub mod xml;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::ParseError;

pub use pattern::PatternFeedParser;
#[cfg(feature = "xml-feeds")]
pub use xml::XmlFeedParser;

/// One item recovered from a feed document, still in feed terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Plain text body (markup already stripped).
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

pub trait FeedParsingStrategy: Send + Sync {
    /// Parse a whole document into at most `limit` items, most recent first.
    fn parse(&self, document: &str, limit: usize) -> Result<Vec<FeedItem>, ParseError>;

    fn name(&self) -> &'static str;
}

pub type SharedStrategy = Arc<dyn FeedParsingStrategy>;

/// Capability probe, done once when the pipeline is assembled.
#[cfg(feature = "xml-feeds")]
pub fn probe_primary() -> Option<SharedStrategy> {
    Some(Arc::new(XmlFeedParser))
}

#[cfg(not(feature = "xml-feeds"))]
pub fn probe_primary() -> Option<SharedStrategy> {
    None
}

/// Keep the `limit` most recent items. Undated items count as "now", so they sort first;
/// ties keep document order.
pub(crate) fn most_recent(mut items: Vec<FeedItem>, limit: usize, now: DateTime<Utc>) -> Vec<FeedItem> {
    items.sort_by_key(|it| std::cmp::Reverse(it.published_at.unwrap_or(now)));
    items.truncate(limit);
    items
}

/// Some publishers leak HTML entities into XML, which strict parsers reject.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
