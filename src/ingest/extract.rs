// src/ingest/extract.rs
//! Deterministic metadata extraction: CVE identifiers and vocabulary tags.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Domain vocabulary matched as case-insensitive substrings of title + body.
pub const TAG_VOCABULARY: &[&str] = &[
    "ransomware",
    "malware",
    "phishing",
    "ddos",
    "breach",
    "exploit",
    "vulnerability",
    "patch",
    "security",
    "cyber",
    "threat",
    "attack",
    "iot",
    "cloud",
    "api",
    "zero-day",
    "apt",
    "crypto",
    "blockchain",
];

static RE_CVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CVE-\d{4}-\d+").expect("static CVE regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Upper-cased, unique, in order of first appearance.
    pub cve_ids: Vec<String>,
    pub tags: BTreeSet<String>,
}

pub fn extract(text: &str) -> Extracted {
    Extracted {
        cve_ids: extract_cve_ids(text),
        tags: extract_tags(text),
    }
}

pub fn extract_cve_ids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in RE_CVE.find_iter(text) {
        let id = m.as_str().to_ascii_uppercase();
        if seen.insert(id.clone()) {
            out.push(id);
        }
    }
    out
}

pub fn extract_tags(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    TAG_VOCABULARY
        .iter()
        .filter(|t| lower.contains(*t))
        .map(|t| t.to_string())
        .collect()
}
