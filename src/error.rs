// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Source-level failures (`FetchError`) are always recovered by the orchestrator.
//! Store-level failures split into a conflict that callers treat as a skip and an
//! unavailable store, which is the only error that leaves a fetch run.

use thiserror::Error;

/// Why a single source contributed nothing to a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchErrorKind {
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("source '{source_name}' failed: {kind}")]
pub struct FetchError {
    pub source_name: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(source_name: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
        }
    }

    pub fn network(source_name: impl Into<String>, e: impl std::fmt::Display) -> Self {
        Self::new(source_name, FetchErrorKind::Network(e.to_string()))
    }

    pub fn parse(source_name: impl Into<String>, e: impl std::fmt::Display) -> Self {
        Self::new(source_name, FetchErrorKind::Parse(e.to_string()))
    }

    pub fn timeout(source_name: impl Into<String>) -> Self {
        Self::new(source_name, FetchErrorKind::Timeout)
    }

    /// Map a reqwest failure onto the taxonomy (timeouts are kept apart from other I/O).
    pub fn from_reqwest(source_name: impl Into<String>, e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = e.status() {
            FetchErrorKind::Status(status.as_u16())
        } else if e.is_decode() {
            FetchErrorKind::Parse(e.to_string())
        } else {
            FetchErrorKind::Network(e.to_string())
        };
        Self::new(source_name, kind)
    }

    /// Short tag used in run reports and metric labels.
    pub fn tag(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Network(_) => "network",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Status(_) => "status",
            FetchErrorKind::Parse(_) => "parse",
        }
    }
}

/// Failure of a feed-parsing strategy on one document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("feed parse failed: {0}")]
pub struct ParseError(pub String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Another record already owns this url.
    #[error("duplicate key: url '{url}' already stored")]
    DuplicateKey { url: String },
    #[error("article store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}
