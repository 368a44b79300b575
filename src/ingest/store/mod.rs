// src/ingest/store/mod.rs
//! Persistence collaborator. The store, not the caller, owns url uniqueness.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ingest::types::{ArticleCandidate, Category, PersistedArticle};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>, StoreError>;

    /// Insert a new record. Fails with `StoreError::DuplicateKey` if the url exists.
    async fn insert(&self, article: &ArticleCandidate) -> Result<PersistedArticle, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn count_by_category(&self) -> Result<BTreeMap<Category, u64>, StoreError>;
}

pub type SharedStore = Arc<dyn ArticleStore>;

/// Open the store named by `database_url` (`memory` or a sqlx SQLite url).
pub async fn open_store(database_url: &str) -> anyhow::Result<SharedStore> {
    if database_url.trim().eq_ignore_ascii_case("memory") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(database_url).await?;
    Ok(Arc::new(store))
}
