// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;

pub use crate::api::{router, AppState};
pub use crate::config::{load_config_default, IngestConfig};
pub use crate::error::{FetchError, FetchErrorKind, StoreError};
pub use crate::ingest::cache::ResultCache;
pub use crate::ingest::orchestrator::FetchOrchestrator;
pub use crate::ingest::scheduler::{setup_schedule, SchedulerHandle, SchedulerState};
pub use crate::ingest::store::{open_store, ArticleStore, SharedStore};
pub use crate::ingest::types::{ArticleCandidate, FetchRun, FetchSummary, SourceAdapter};
