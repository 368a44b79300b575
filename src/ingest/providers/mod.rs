// src/ingest/providers/mod.rs
pub mod feed;
pub mod nvd;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::FetchError;

pub const USER_AGENT: &str =
    "threat-intel-ingest/0.1 (security news aggregator; +https://nvd.nist.gov)";

/// One HTTP client shared by all adapters; `timeout` bounds every call.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout.min(Duration::from_secs(4)))
        .timeout(timeout)
        .build()
        .context("building reqwest client")
}

/// GET `url` and return the body, mapping every failure onto the fetch taxonomy.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    source_name: &str,
) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(source_name, &e))?;
    let resp = resp
        .error_for_status()
        .map_err(|e| FetchError::from_reqwest(source_name, &e))?;
    resp.text()
        .await
        .map_err(|e| FetchError::from_reqwest(source_name, &e))
}
