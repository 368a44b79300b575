// tests/api_http.rs
//
// HTTP-level tests for the control-plane Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use threat_intel_ingest::api::{self, AppState};
use threat_intel_ingest::ingest::orchestrator::SharedAdapter;
use threat_intel_ingest::ingest::store::MemoryStore;
use threat_intel_ingest::ingest::types::{ArticleCandidate, Category, PersistedArticle, SourceKind};
use threat_intel_ingest::{
    ArticleStore, FetchError, FetchOrchestrator, SharedStore, SourceAdapter, StoreError,
};

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Default)]
struct TwoStories {
    calls: AtomicUsize,
}

#[async_trait]
impl SourceAdapter for TwoStories {
    async fn fetch(&self, _limit: Option<usize>) -> Result<Vec<ArticleCandidate>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let mk = |url: &str, category: Category| ArticleCandidate {
            title: url.to_string(),
            content: String::new(),
            excerpt: String::new(),
            url: url.to_string(),
            source: SourceKind::Feed,
            source_name: "stub".into(),
            published_at: now,
            fetched_at: now,
            category,
            tags: Default::default(),
            cve_ids: vec![],
            severity: None,
            image_url: None,
            metadata: None,
        };
        Ok(vec![
            mk("https://s.example/1", Category::News),
            mk("https://s.example/2", Category::Vulnerability),
        ])
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct DownStore;

#[async_trait]
impl ArticleStore for DownStore {
    async fn find_by_url(&self, _url: &str) -> Result<Option<PersistedArticle>, StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }
    async fn insert(&self, _a: &ArticleCandidate) -> Result<PersistedArticle, StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }
    async fn count(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }
    async fn count_by_category(&self) -> Result<BTreeMap<Category, u64>, StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }
}

fn test_router(source: &Arc<TwoStories>, store: SharedStore) -> Router {
    let adapter: SharedAdapter = source.clone();
    let orch = Arc::new(FetchOrchestrator::new(vec![adapter], store, Duration::from_secs(5)));
    api::router(AppState::new(orch, Duration::from_secs(900)))
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router(&Arc::default(), Arc::new(MemoryStore::new()));
    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn manual_fetch_reports_summary_and_is_cached() {
    let source = Arc::new(TwoStories::default());
    let app = test_router(&source, Arc::new(MemoryStore::new()));

    let (status, body) = send(&app, "POST", "/news/fetch").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["message"], "News fetch completed");
    assert_eq!(v["stored"], 2);
    assert_eq!(v["skipped"], 0);
    assert_eq!(v["total"], 2);

    // Inside the TTL the same summary comes back without another run.
    let (_, body2) = send(&app, "POST", "/news/fetch").await;
    let v2: Json = serde_json::from_slice(&body2).unwrap();
    assert_eq!(v, v2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stats_count_by_category() {
    let source = Arc::new(TwoStories::default());
    let app = test_router(&source, Arc::new(MemoryStore::new()));
    send(&app, "POST", "/news/fetch").await;

    let (status, body) = send(&app, "GET", "/news/stats").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["total"], 2);
    assert_eq!(v["by_category"]["news"], 1);
    assert_eq!(v["by_category"]["vulnerability"], 1);
}

#[tokio::test]
async fn store_outage_surfaces_as_500() {
    let app = test_router(&Arc::default(), Arc::new(DownStore));

    let (status, body) = send(&app, "POST", "/news/fetch").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("database is locked"));

    let (status, _) = send(&app, "GET", "/news/stats").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
