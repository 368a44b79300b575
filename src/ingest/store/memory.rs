// src/ingest/store/memory.rs
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::ArticleStore;
use crate::error::StoreError;
use crate::ingest::types::{ArticleCandidate, Category, PersistedArticle};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    by_url: HashMap<String, PersistedArticle>,
}

/// In-process store. The url check and the insert happen under one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }

    /// All stored articles ordered by id.
    pub fn snapshot(&self) -> Vec<PersistedArticle> {
        let Ok(g) = self.lock() else {
            return Vec::new();
        };
        let mut v: Vec<_> = g.by_url.values().cloned().collect();
        v.sort_by_key(|a| a.id);
        v
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>, StoreError> {
        Ok(self.lock()?.by_url.get(url).cloned())
    }

    async fn insert(&self, article: &ArticleCandidate) -> Result<PersistedArticle, StoreError> {
        let mut g = self.lock()?;
        if g.by_url.contains_key(&article.url) {
            return Err(StoreError::DuplicateKey {
                url: article.url.clone(),
            });
        }
        g.next_id += 1;
        let stored = PersistedArticle {
            id: g.next_id,
            article: article.clone(),
        };
        g.by_url.insert(article.url.clone(), stored.clone());
        Ok(stored)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.by_url.len() as u64)
    }

    async fn count_by_category(&self) -> Result<BTreeMap<Category, u64>, StoreError> {
        let g = self.lock()?;
        let mut out = BTreeMap::new();
        for a in g.by_url.values() {
            *out.entry(a.article.category).or_insert(0) += 1;
        }
        Ok(out)
    }
}
