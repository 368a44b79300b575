// src/ingest/cache.rs
//! Single-slot TTL memoization for manual fetch triggers.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Key used by the manual-trigger route.
pub const NEWS_FETCH_CACHE_KEY: &str = "news_fetch";

#[derive(Debug, Clone)]
struct Slot<T> {
    key: String,
    value: T,
    stored_at: Instant,
}

/// One cached value with its age. A different key replaces the slot.
///
/// The lock is not held while the producer runs, so concurrent misses may both run;
/// the last one to finish wins the slot.
#[derive(Debug)]
pub struct ResultCache<T: Clone> {
    slot: Mutex<Option<Slot<T>>>,
}

impl<T: Clone> Default for ResultCache<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> ResultCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if younger than `ttl`, else run `fetch` and cache it.
    /// Errors pass through and leave the slot untouched.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(v) = self.fresh(key, ttl).await {
            counter!("ingest_cache_hits_total").increment(1);
            tracing::debug!(target: "ingest", key, "cache hit");
            return Ok(v);
        }
        counter!("ingest_cache_misses_total").increment(1);

        let value = fetch().await?;
        *self.slot.lock().await = Some(Slot {
            key: key.to_string(),
            value: value.clone(),
            stored_at: Instant::now(),
        });
        Ok(value)
    }

    async fn fresh(&self, key: &str, ttl: Duration) -> Option<T> {
        let g = self.slot.lock().await;
        g.as_ref()
            .filter(|s| s.key == key && s.stored_at.elapsed() < ttl)
            .map(|s| s.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn other_key_is_a_miss() {
        let cache = ResultCache::<u32>::new();
        let ttl = Duration::from_secs(60);
        let a: Result<u32, ()> = cache.get_or_fetch("a", ttl, || async { Ok(1) }).await;
        let b: Result<u32, ()> = cache.get_or_fetch("b", ttl, || async { Ok(2) }).await;
        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(2));
    }
}
