// src/ingest/persist.rs
//! Deduplicating writer. One candidate at a time; the store's unique url is the real guard.

use metrics::counter;

use crate::error::StoreError;
use crate::ingest::store::SharedStore;
use crate::ingest::types::{ArticleCandidate, PersistOutcome};

#[derive(Clone)]
pub struct Persister {
    store: SharedStore,
}

impl Persister {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Store every candidate whose url is new; skip the rest.
    ///
    /// A duplicate-key conflict at insert time (another run won the race) is a skip.
    /// Only `StoreError::Unavailable` is returned.
    pub async fn persist(&self, candidates: &[ArticleCandidate]) -> Result<PersistOutcome, StoreError> {
        let mut out = PersistOutcome::default();

        for c in candidates {
            if self.store.find_by_url(&c.url).await?.is_some() {
                out.skipped += 1;
                continue;
            }
            match self.store.insert(c).await {
                Ok(_) => out.stored += 1,
                Err(StoreError::DuplicateKey { url }) => {
                    tracing::debug!(target: "ingest", %url, "lost insert race, skipping");
                    out.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        counter!("ingest_stored_total").increment(out.stored as u64);
        counter!("ingest_skipped_total").increment(out.skipped as u64);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::store::MemoryStore;
    use crate::ingest::types::{Category, SourceKind};
    use chrono::Utc;
    use std::sync::Arc;

    fn cand(url: &str) -> ArticleCandidate {
        let now = Utc::now();
        ArticleCandidate {
            title: "t".into(),
            content: String::new(),
            excerpt: String::new(),
            url: url.into(),
            source: SourceKind::Feed,
            source_name: "x".into(),
            published_at: now,
            fetched_at: now,
            category: Category::News,
            tags: Default::default(),
            cve_ids: vec![],
            severity: None,
            image_url: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn duplicates_inside_one_batch_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let p = Persister::new(store.clone());
        let out = p
            .persist(&[cand("https://a/1"), cand("https://a/2"), cand("https://a/1")])
            .await
            .unwrap();
        assert_eq!(out, PersistOutcome { stored: 2, skipped: 1 });
        assert_eq!(store.snapshot().len(), 2);
    }
}
