// src/ingest/parsing/pattern.rs
//! Best-effort feed scraping over raw markup. Broken fragments are skipped, never fatal.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{most_recent, non_empty, FeedItem, FeedParsingStrategy};
use crate::error::ParseError;
use crate::ingest::{normalize_text, parse_timestamp};

static RE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item>").expect("item regex"));
static RE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry\b[^>]*>(.*?)</entry>").expect("entry regex"));
static RE_CDATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"));
static RE_ATOM_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<link\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).expect("href regex")
});
static RE_IMG_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<media:content\b[^>]*\burl\s*=\s*["']([^"']+)["']"#).expect("media regex")
});

static RE_ENCLOSURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<enclosure\b[^>]*>").expect("enclosure regex"));
static RE_ATTR_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\burl\s*=\s*["']([^"']+)["']"#).expect("url attr regex"));
static RE_ATTR_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\btype\s*=\s*["']([^"']+)["']"#).expect("type attr regex"));

fn tag_regex(tag: &str) -> Regex {
    // `tag` is one of a fixed set of element names.
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}>")).expect("element regex")
}

static RE_TITLE: Lazy<Regex> = Lazy::new(|| tag_regex("title"));
static RE_LINK: Lazy<Regex> = Lazy::new(|| tag_regex("link"));
static RE_DESCRIPTION: Lazy<Regex> = Lazy::new(|| tag_regex("description"));
static RE_CONTENT_ENCODED: Lazy<Regex> = Lazy::new(|| tag_regex("content:encoded"));
static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| tag_regex("summary"));
static RE_CONTENT: Lazy<Regex> = Lazy::new(|| tag_regex("content"));
static RE_PUB_DATE: Lazy<Regex> = Lazy::new(|| tag_regex("pubDate"));
static RE_PUBLISHED: Lazy<Regex> = Lazy::new(|| tag_regex("published"));
static RE_UPDATED: Lazy<Regex> = Lazy::new(|| tag_regex("updated"));

fn capture(re: &Regex, fragment: &str) -> Option<String> {
    re.captures(fragment)
        .and_then(|c| c.get(1))
        .map(|m| unwrap_cdata(m.as_str()))
}

/// `media:content` first, else the first `enclosure` with an `image/*` type.
fn image_url(fragment: &str) -> Option<String> {
    let attr = |re: &Regex, tag: &str| {
        re.captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };
    RE_IMG_URL
        .captures(fragment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            RE_ENCLOSURE.find_iter(fragment).find_map(|m| {
                let is_image = attr(&RE_ATTR_TYPE, m.as_str())
                    .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"));
                if is_image {
                    non_empty(attr(&RE_ATTR_URL, m.as_str()))
                } else {
                    None
                }
            })
        })
}

fn unwrap_cdata(s: &str) -> String {
    RE_CDATA.replace_all(s, "$1").trim().to_string()
}

/// Regex-driven fallback for documents the structured parser cannot handle.
pub struct PatternFeedParser;

impl PatternFeedParser {
    fn scrape_item(fragment: &str) -> Option<FeedItem> {
        let title = non_empty(capture(&RE_TITLE, fragment).map(|t| normalize_text(&t)))?;
        let link = non_empty(capture(&RE_LINK, fragment))?;
        let body = capture(&RE_DESCRIPTION, fragment)
            .or_else(|| capture(&RE_CONTENT_ENCODED, fragment))
            .map(|d| normalize_text(&d));
        Some(FeedItem {
            title: Some(title),
            link: Some(link),
            body: non_empty(body),
            published_at: capture(&RE_PUB_DATE, fragment)
                .as_deref()
                .and_then(parse_timestamp),
            image_url: image_url(fragment),
        })
    }

    fn scrape_entry(fragment: &str) -> Option<FeedItem> {
        let title = non_empty(capture(&RE_TITLE, fragment).map(|t| normalize_text(&t)))?;
        let link = RE_ATOM_HREF
            .captures(fragment)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())?;
        let body = capture(&RE_SUMMARY, fragment)
            .or_else(|| capture(&RE_CONTENT, fragment))
            .map(|d| normalize_text(&d));
        let date = capture(&RE_PUBLISHED, fragment).or_else(|| capture(&RE_UPDATED, fragment));
        Some(FeedItem {
            title: Some(title),
            link: non_empty(Some(link)),
            body: non_empty(body),
            published_at: date.as_deref().and_then(parse_timestamp),
            image_url: None,
        })
    }
}

impl FeedParsingStrategy for PatternFeedParser {
    fn parse(&self, document: &str, limit: usize) -> Result<Vec<FeedItem>, ParseError> {
        let mut fragments = 0usize;
        let mut items = Vec::new();

        for cap in RE_ITEM.captures_iter(document) {
            fragments += 1;
            match cap.get(1).and_then(|m| Self::scrape_item(m.as_str())) {
                Some(it) => items.push(it),
                None => tracing::debug!(target: "ingest", "skipping malformed feed item"),
            }
        }
        if fragments == 0 {
            for cap in RE_ENTRY.captures_iter(document) {
                fragments += 1;
                match cap.get(1).and_then(|m| Self::scrape_entry(m.as_str())) {
                    Some(it) => items.push(it),
                    None => tracing::debug!(target: "ingest", "skipping malformed feed entry"),
                }
            }
        }

        if fragments == 0 {
            return Err(ParseError("no <item> or <entry> elements found".to_string()));
        }
        Ok(most_recent(items, limit, Utc::now()))
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_items_and_skips_broken_ones() {
        let doc = r#"<rss><channel>
            <item><title><![CDATA[Good <em>one</em>]]></title><link>https://x.example/1</link>
              <description><![CDATA[<p>Body &amp; more</p>]]></description>
              <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate></item>
            <item><title>No link here</title></item>
            <item><title>Second</title><link> https://x.example/2 </link></item>
            <item><title>Unclosed<link>https://x.example/3</link></item>
        </channel></rss>"#;
        let items = PatternFeedParser.parse(doc, 20).unwrap();
        let links: Vec<_> = items.iter().filter_map(|i| i.link.clone()).collect();
        assert_eq!(items.len(), 2);
        assert!(links.contains(&"https://x.example/1".to_string()));
        assert!(links.contains(&"https://x.example/2".to_string()));
        let good = items.iter().find(|i| i.link.as_deref() == Some("https://x.example/1")).unwrap();
        assert_eq!(good.title.as_deref(), Some("Good one"));
        assert_eq!(good.body.as_deref(), Some("Body & more"));
        assert!(good.published_at.is_some());
    }

    #[test]
    fn scrapes_atom_entries() {
        let doc = r#"<feed><entry><title>A</title><link href="https://a.example/p"/>
            <summary>S</summary><published>2024-01-01T00:00:00Z</published></entry></feed>"#;
        let items = PatternFeedParser.parse(doc, 20).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://a.example/p"));
    }

    #[test]
    fn respects_limit() {
        let doc: String = (0..30)
            .map(|i| format!("<item><title>t{i}</title><link>https://l/{i}</link></item>"))
            .collect();
        assert_eq!(PatternFeedParser.parse(&doc, 20).unwrap().len(), 20);
    }

    #[test]
    fn body_and_image_fall_back_like_the_xml_parser() {
        let doc = r#"<rss><channel>
            <item><title>Encoded only</title><link>https://x.example/enc</link>
              <content:encoded><![CDATA[<p>Full <b>story</b></p>]]></content:encoded>
              <enclosure url="https://x.example/a.mp3" type="audio/mpeg" length="1"/>
              <enclosure url="https://x.example/a.png" type="image/png" length="1"/></item>
            <item><title>Podcast</title><link>https://x.example/pod</link>
              <description>Episode</description>
              <enclosure url="https://x.example/e.mp3" type="audio/mpeg"/></item>
        </channel></rss>"#;
        let items = PatternFeedParser.parse(doc, 20).unwrap();
        let enc = items.iter().find(|i| i.title.as_deref() == Some("Encoded only")).unwrap();
        assert_eq!(enc.body.as_deref(), Some("Full story"));
        assert_eq!(enc.image_url.as_deref(), Some("https://x.example/a.png"));

        let pod = items.iter().find(|i| i.title.as_deref() == Some("Podcast")).unwrap();
        assert_eq!(pod.body.as_deref(), Some("Episode"));
        assert_eq!(pod.image_url, None);
    }

    #[test]
    fn document_without_items_is_an_error() {
        assert!(PatternFeedParser.parse("<html>maintenance</html>", 20).is_err());
    }
}
