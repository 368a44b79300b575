// src/ingest/mod.rs
pub mod cache;
pub mod extract;
pub mod orchestrator;
pub mod parsing;
pub mod persist;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// Excerpt length in characters.
pub const EXCERPT_CHARS: usize = 200;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Completed fetch runs.");
        describe_counter!(
            "ingest_candidates_total",
            "Candidates produced by all sources."
        );
        describe_counter!("ingest_stored_total", "Candidates persisted as new articles.");
        describe_counter!(
            "ingest_skipped_total",
            "Candidates skipped because their url was already stored."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse failures, by source and kind."
        );
        describe_counter!(
            "ingest_fallback_parses_total",
            "Feeds recovered by the pattern parser after the primary parser failed."
        );
        describe_counter!("ingest_cache_hits_total", "Manual fetches served from cache.");
        describe_counter!(
            "ingest_cache_misses_total",
            "Manual fetches that ran the pipeline."
        );
        describe_histogram!("ingest_run_ms", "Fetch run duration in milliseconds.");
        describe_histogram!(
            "ingest_fetch_ms",
            "Per-source fetch duration in milliseconds."
        );
        describe_gauge!("ingest_last_run_ts", "Unix ts when the last fetch run finished.");
        describe_gauge!(
            "ingest_schedule_interval_minutes",
            "Configured scheduler interval."
        );
    });
}

/// Turn feed markup into plain text: decode entities, strip tags, fold whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tags regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// First `EXCERPT_CHARS` characters of `content`.
pub fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHARS).collect()
}

/// Parse the date formats feeds and the vulnerability DB use.
/// RFC 2822 (RSS), RFC 3339 (Atom), and zone-less ISO timestamps (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_text_strips_markup_and_folds_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>\n\n ";
        assert_eq!(normalize_text(s), "Hello, world");
    }

    #[test]
    fn normalize_text_handles_escaped_html() {
        let s = "&lt;p&gt;Patch now &ldquo;please&rdquo;&lt;/p&gt;";
        assert_eq!(normalize_text(s), r#"Patch now "please""#);
    }

    #[test]
    fn excerpt_counts_chars_not_bytes() {
        let s = "é".repeat(250);
        let e = excerpt(&s);
        assert_eq!(e.chars().count(), 200);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn parses_feed_and_db_dates() {
        let want = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("Tue, 05 Mar 2024 10:00:00 +0000"), Some(want));
        assert_eq!(parse_timestamp("Tue, 05 Mar 2024 10:00:00 GMT"), Some(want));
        assert_eq!(parse_timestamp("2024-03-05T10:00:00Z"), Some(want));
        assert_eq!(parse_timestamp("2024-03-05T10:00:00.000"), Some(want));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
