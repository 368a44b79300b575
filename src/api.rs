use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::ingest::cache::{ResultCache, NEWS_FETCH_CACHE_KEY};
use crate::ingest::orchestrator::FetchOrchestrator;
use crate::ingest::types::FetchSummary;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FetchOrchestrator>,
    pub cache: Arc<ResultCache<FetchSummary>>,
    pub cache_ttl: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, cache_ttl: Duration) -> Self {
        Self {
            orchestrator,
            cache: Arc::new(ResultCache::new()),
            cache_ttl,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news/fetch", post(fetch_news))
        .route("/news/stats", get(news_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct FetchResp {
    message: &'static str,
    #[serde(flatten)]
    summary: FetchSummary,
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResp {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Manual trigger. Served from the result cache while it is fresh.
async fn fetch_news(State(state): State<AppState>) -> Response {
    let orch = state.orchestrator.clone();
    let res = state
        .cache
        .get_or_fetch(NEWS_FETCH_CACHE_KEY, state.cache_ttl, || async move {
            orch.run_fetch_cycle().await
        })
        .await;

    match res {
        Ok(summary) => Json(FetchResp {
            message: "News fetch completed",
            summary,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, "manual news fetch failed");
            internal_error(e)
        }
    }
}

#[derive(Serialize)]
struct StatsResp {
    total: u64,
    by_category: BTreeMap<String, u64>,
}

async fn news_stats(State(state): State<AppState>) -> Response {
    let store = state.orchestrator.store();
    let total = match store.count().await {
        Ok(n) => n,
        Err(e) => return internal_error(e),
    };
    let by_category = match store.count_by_category().await {
        Ok(m) => m
            .into_iter()
            .map(|(c, n)| (c.as_str().to_string(), n))
            .collect(),
        Err(e) => return internal_error(e),
    };
    Json(StatsResp { total, by_category }).into_response()
}
