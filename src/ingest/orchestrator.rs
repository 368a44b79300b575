// src/ingest/orchestrator.rs
//! One fetch run: every adapter concurrently, failures isolated, then persistence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, gauge, histogram};

use crate::config::IngestConfig;
use crate::error::{FetchError, StoreError};
use crate::ingest::ensure_metrics_described;
use crate::ingest::parsing::{probe_primary, SharedStrategy};
use crate::ingest::persist::Persister;
use crate::ingest::providers::build_http_client;
use crate::ingest::providers::feed::{FallbackFeedAdapter, FeedAdapter};
use crate::ingest::providers::nvd::NvdAdapter;
use crate::ingest::store::SharedStore;
use crate::ingest::types::{
    ArticleCandidate, FetchRun, FetchSummary, RunTotals, SourceAdapter, SourceOutcome,
    SourceReport,
};

pub type SharedAdapter = Arc<dyn SourceAdapter>;

pub struct FetchOrchestrator {
    adapters: Vec<SharedAdapter>,
    persister: Persister,
    call_timeout: Duration,
}

impl FetchOrchestrator {
    pub fn new(adapters: Vec<SharedAdapter>, store: SharedStore, call_timeout: Duration) -> Self {
        Self {
            adapters,
            persister: Persister::new(store),
            call_timeout,
        }
    }

    /// Assemble the vulnerability-DB adapter plus one adapter per configured feed.
    /// The feed parsing capability is probed here, once.
    pub fn from_config(cfg: &IngestConfig, store: SharedStore) -> Result<Self> {
        let client = build_http_client(cfg.per_call_timeout())?;
        let primary = probe_primary();
        if primary.is_none() {
            tracing::warn!(target: "ingest", "structured feed parser unavailable, using pattern parser for all feeds");
        }
        let adapters = build_adapters(cfg, client, primary);
        Ok(Self::new(adapters, store, cfg.per_call_timeout()))
    }

    pub fn adapters(&self) -> &[SharedAdapter] {
        &self.adapters
    }

    pub fn store(&self) -> &SharedStore {
        self.persister.store()
    }

    /// Run every source, persist what they produced and report.
    ///
    /// Source failures never fail the run; only an unavailable store does.
    pub async fn run(&self) -> Result<FetchRun, StoreError> {
        ensure_metrics_described();
        let started_at = Utc::now();
        let t0 = Instant::now();

        let results = join_all(self.adapters.iter().map(|a| self.fetch_one(a.as_ref()))).await;

        let mut candidates: Vec<ArticleCandidate> = Vec::new();
        let mut sources = Vec::with_capacity(results.len());
        for (adapter, result) in self.adapters.iter().zip(results) {
            let outcome = match result {
                Ok(mut v) => {
                    let n = v.len();
                    candidates.append(&mut v);
                    SourceOutcome::Fetched { candidates: n }
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = adapter.name(), kind = e.tag(), error = %e, "source failed, continuing without it");
                    counter!(
                        "ingest_source_errors_total",
                        "source" => adapter.name().to_string(),
                        "kind" => e.tag()
                    )
                    .increment(1);
                    SourceOutcome::Failed {
                        error: e.tag().to_string(),
                    }
                }
            };
            sources.push(SourceReport {
                source: adapter.name().to_string(),
                outcome,
            });
        }

        tracing::info!(target: "ingest", fetched = candidates.len(), "fetched articles from all sources");
        counter!("ingest_candidates_total").increment(candidates.len() as u64);

        let persisted = self.persister.persist(&candidates).await?;

        let duration_ms = t0.elapsed().as_millis() as u64;
        let run = FetchRun {
            started_at,
            duration_ms,
            sources,
            totals: RunTotals {
                fetched: candidates.len(),
                stored: persisted.stored,
                skipped: persisted.skipped,
            },
        };

        counter!("ingest_runs_total").increment(1);
        histogram!("ingest_run_ms").record(duration_ms as f64);
        gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            duration_ms,
            stored = run.totals.stored,
            skipped = run.totals.skipped,
            "news fetch completed"
        );
        Ok(run)
    }

    /// `run()` reduced to the `{stored, skipped, total}` summary.
    pub async fn run_fetch_cycle(&self) -> Result<FetchSummary, StoreError> {
        Ok(self.run().await?.summary())
    }

    async fn fetch_one(&self, adapter: &dyn SourceAdapter) -> Result<Vec<ArticleCandidate>, FetchError> {
        match tokio::time::timeout(self.call_timeout, adapter.fetch(None)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::timeout(adapter.name())),
        }
    }
}

fn build_adapters(
    cfg: &IngestConfig,
    client: reqwest::Client,
    primary: Option<SharedStrategy>,
) -> Vec<SharedAdapter> {
    let mut adapters: Vec<SharedAdapter> = Vec::with_capacity(cfg.feeds.len() + 1);
    adapters.push(Arc::new(NvdAdapter::new(client.clone(), cfg.nvd.clone())));

    for feed in &cfg.feeds {
        let adapter: SharedAdapter = match &primary {
            Some(strategy) => Arc::new(FeedAdapter::new(
                feed.clone(),
                client.clone(),
                cfg.feed_item_limit,
                strategy.clone(),
            )),
            None => Arc::new(FallbackFeedAdapter::new(
                feed.clone(),
                client.clone(),
                cfg.feed_item_limit,
            )),
        };
        adapters.push(adapter);
    }
    adapters
}
