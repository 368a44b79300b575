// src/ingest/store/sqlite.rs
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteRow, Row, SqlitePool};

use super::ArticleStore;
use crate::error::StoreError;
use crate::ingest::types::{
    ArticleCandidate, Category, Metadata, PersistedArticle, Severity, SourceKind,
};

const SELECT_COLUMNS: &str = "id, title, content, excerpt, url, source, source_name, published_at, \
     fetched_at, category, tags, cve_ids, severity, image_url, metadata";

/// SQLite-backed article store. `url` carries a UNIQUE constraint.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(url);
        }
        // Every connection to ":memory:" is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        let store = Self { pool };
        store.migrate().await.context("running article store migrations")?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_articles (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                source_name TEXT NOT NULL,
                published_at TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL,
                cve_ids TEXT NOT NULL,
                severity TEXT,
                image_url TEXT,
                metadata TEXT,
                views INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_published ON news_articles(published_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_category ON news_articles(category, published_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn ensure_parent_dir(url: &str) {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, dir = %parent.display(), "could not create database dir");
            }
        }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("corrupt {what} column: {e}"))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

fn row_to_article(row: &SqliteRow) -> Result<PersistedArticle, StoreError> {
    let get_s = |col: &str| row.try_get::<String, _>(col).map_err(unavailable);

    let tags: BTreeSet<String> =
        serde_json::from_str(&get_s("tags")?).map_err(|e| corrupt("tags", e))?;
    let cve_ids: Vec<String> =
        serde_json::from_str(&get_s("cve_ids")?).map_err(|e| corrupt("cve_ids", e))?;
    let metadata: Option<Metadata> = row
        .try_get::<Option<String>, _>("metadata")
        .map_err(unavailable)?
        .map(|m| serde_json::from_str::<Metadata>(&m))
        .transpose()
        .map_err(|e| corrupt("metadata", e))?;
    let severity = row
        .try_get::<Option<String>, _>("severity")
        .map_err(unavailable)?
        .map(|s| s.parse::<Severity>())
        .transpose()
        .map_err(|e| corrupt("severity", e))?;

    Ok(PersistedArticle {
        id: row.try_get::<i64, _>("id").map_err(unavailable)?,
        article: ArticleCandidate {
            title: get_s("title")?,
            content: get_s("content")?,
            excerpt: get_s("excerpt")?,
            url: get_s("url")?,
            source: get_s("source")?
                .parse::<SourceKind>()
                .map_err(|e| corrupt("source", e))?,
            source_name: get_s("source_name")?,
            published_at: parse_ts(&get_s("published_at")?)?,
            fetched_at: parse_ts(&get_s("fetched_at")?)?,
            category: get_s("category")?
                .parse::<Category>()
                .map_err(|e| corrupt("category", e))?,
            tags,
            cve_ids,
            severity,
            image_url: row.try_get::<Option<String>, _>("image_url").map_err(unavailable)?,
            metadata,
        },
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<PersistedArticle>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM news_articles WHERE url = ?");
        let row = sqlx::query(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn insert(&self, a: &ArticleCandidate) -> Result<PersistedArticle, StoreError> {
        let tags = serde_json::to_string(&a.tags).map_err(|e| corrupt("tags", e))?;
        let cve_ids = serde_json::to_string(&a.cve_ids).map_err(|e| corrupt("cve_ids", e))?;
        let metadata = a
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| corrupt("metadata", e))?;

        let result = sqlx::query(
            r#"
            INSERT INTO news_articles (
                title, content, excerpt, url, source, source_name, published_at,
                fetched_at, category, tags, cve_ids, severity, image_url, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&a.title)
        .bind(&a.content)
        .bind(&a.excerpt)
        .bind(&a.url)
        .bind(a.source.as_str())
        .bind(&a.source_name)
        .bind(a.published_at.to_rfc3339())
        .bind(a.fetched_at.to_rfc3339())
        .bind(a.category.as_str())
        .bind(tags)
        .bind(cve_ids)
        .bind(a.severity.map(|s| s.as_str()))
        .bind(&a.image_url)
        .bind(metadata)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(PersistedArticle {
                id: done.last_insert_rowid(),
                article: a.clone(),
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey { url: a.url.clone() })
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(n.max(0) as u64)
    }

    async fn count_by_category(&self) -> Result<BTreeMap<Category, u64>, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT category, COUNT(*) FROM news_articles GROUP BY category")
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
        let mut out = BTreeMap::new();
        for (cat, n) in rows {
            match cat.parse::<Category>() {
                Ok(c) => {
                    out.insert(c, n.max(0) as u64);
                }
                Err(e) => tracing::warn!(error = %e, "skipping unknown category in stats"),
            }
        }
        Ok(out)
    }
}
