//! Read-through lookups: serve a fresh cached projection or load, store and
//! return it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ports::FastStore;

use super::CacheKey;

#[derive(Clone)]
pub struct ReadThrough {
    store: Arc<dyn FastStore>,
}

impl ReadThrough {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self { store }
    }

    /// Return the cached value for `key`, or run `load` and cache its result
    /// for `ttl`. Loader errors are returned untouched and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.to_string();
        if let Some(hit) = self.lookup(&key).await {
            return Ok(hit);
        }

        tracing::debug!(key = %key, "Cache miss");
        let value = load().await?;
        self.fill(&key, &value, ttl).await;
        Ok(value)
    }

    /// Cached value, if present and decodable. Backend errors and undecodable
    /// entries both count as a miss.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Fast store read failed, using durable store");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Best-effort write; failures are logged only.
    pub async fn fill<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Could not serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw, Some(ttl)).await {
            tracing::warn!(key = %key, error = %e, "Fast store write failed");
        }
    }
}
