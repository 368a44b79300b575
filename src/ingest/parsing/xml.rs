// src/ingest/parsing/xml.rs
use chrono::Utc;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{most_recent, non_empty, scrub_html_entities_for_xml, FeedItem, FeedParsingStrategy};
use crate::error::ParseError;
use crate::ingest::{normalize_text, parse_timestamp};

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
    // RSS 1.0 (RDF) keeps items next to the channel.
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date")]
    dc_date: Option<String>,
    enclosure: Option<Enclosure>,
    #[serde(rename = "media:content", default)]
    media_content: Vec<MediaContent>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Structured RSS/Atom parser built on quick-xml's serde support.
pub struct XmlFeedParser;

impl XmlFeedParser {
    fn parse_rss(doc: &str) -> Result<Vec<FeedItem>, ParseError> {
        let rss: Rss = from_str(doc).map_err(|e| ParseError(format!("rss: {e}")))?;
        Ok(rss
            .channel
            .item
            .into_iter()
            .chain(rss.item)
            .map(rss_item)
            .collect())
    }

    fn parse_atom(doc: &str) -> Result<Vec<FeedItem>, ParseError> {
        let feed: AtomFeed = from_str(doc).map_err(|e| ParseError(format!("atom: {e}")))?;
        Ok(feed.entry.into_iter().map(atom_entry).collect())
    }
}

impl FeedParsingStrategy for XmlFeedParser {
    fn parse(&self, document: &str, limit: usize) -> Result<Vec<FeedItem>, ParseError> {
        let doc = scrub_html_entities_for_xml(document);
        let items = if doc.contains("<rss") || doc.contains("<rdf:RDF") {
            Self::parse_rss(&doc)?
        } else if doc.contains("<feed") {
            Self::parse_atom(&doc)?
        } else {
            return Err(ParseError("document is neither RSS nor Atom".to_string()));
        };
        Ok(most_recent(items, limit, Utc::now()))
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}

fn rss_item(it: RssItem) -> FeedItem {
    let body = it
        .description
        .as_deref()
        .or(it.content_encoded.as_deref())
        .map(normalize_text);

    let image_url = it
        .media_content
        .into_iter()
        .find_map(|m| non_empty(m.url))
        .or_else(|| {
            it.enclosure.and_then(|e| {
                let is_image = e
                    .mime
                    .as_deref()
                    .is_some_and(|t| t.starts_with("image/"));
                if is_image {
                    non_empty(e.url)
                } else {
                    None
                }
            })
        });

    FeedItem {
        title: non_empty(it.title.as_deref().map(normalize_text)),
        link: non_empty(it.link),
        body: non_empty(body),
        published_at: it
            .pub_date
            .or(it.dc_date)
            .as_deref()
            .and_then(parse_timestamp),
        image_url,
    }
}

fn atom_entry(e: AtomEntry) -> FeedItem {
    // Prefer rel="alternate" (or no rel), else any link.
    let link = e
        .link
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.link.first())
        .and_then(|l| l.href.clone());

    let body = e
        .summary
        .or(e.content)
        .map(|t| normalize_text(&t.value));

    FeedItem {
        title: non_empty(e.title.map(|t| normalize_text(&t.value))),
        link: non_empty(link),
        body: non_empty(body),
        published_at: e.published.or(e.updated).as_deref().and_then(parse_timestamp),
        image_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Sec</title>
    <link>https://sec.example</link>
    <item>
      <title>Old one</title>
      <link>https://sec.example/old</link>
      <description><![CDATA[<p>Older &amp; <b>bold</b></p>]]></description>
      <pubDate>Mon, 01 Jan 2024 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>New one</title>
      <link>https://sec.example/new</link>
      <description>Fresh&nbsp;news</description>
      <pubDate>Wed, 03 Jan 2024 08:00:00 +0000</pubDate>
      <enclosure url="https://sec.example/img.png" type="image/png" length="1"/>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Sec</title>
  <entry>
    <title type="html">Atom entry</title>
    <link rel="self" href="https://atom.example/self"/>
    <link rel="alternate" href="https://atom.example/post"/>
    <summary>Summary text</summary>
    <updated>2024-02-01T12:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_sorted_newest_first() {
        let items = XmlFeedParser.parse(RSS, 20).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("New one"));
        assert_eq!(items[0].body.as_deref(), Some("Fresh news"));
        assert_eq!(items[0].image_url.as_deref(), Some("https://sec.example/img.png"));
        assert_eq!(items[1].body.as_deref(), Some("Older & bold"));
    }

    #[test]
    fn atom_prefers_alternate_link() {
        let items = XmlFeedParser.parse(ATOM, 20).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://atom.example/post"));
        assert_eq!(items[0].body.as_deref(), Some("Summary text"));
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn non_feed_document_is_an_error() {
        assert!(XmlFeedParser.parse("<html><body>nope</body></html>", 20).is_err());
    }

    #[test]
    fn broken_markup_is_an_error() {
        let broken = "<rss><channel><item><title>x</title><link>y</item></channel></rss>";
        assert!(XmlFeedParser.parse(broken, 20).is_err());
    }
}
