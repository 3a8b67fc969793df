//! Read-Through Accessor
//!
//! Shared cache handle that serves fresh entries from the TTL store and
//! falls back to a caller-supplied fetch on a miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::keys::{build_key, Pagination, ResourceClass, TenantScope};
use crate::cache::{CacheStats, TtlStore};
use crate::error::CacheError;

// == Shared Cache ==
/// Cloneable handle to one process-wide TTL store.
///
/// Values are kept as `serde_json::Value`, the row format of the data
/// service, and converted to the caller's type on the way in and out.
/// The lock is only held for the duration of a single store operation and
/// never across a fetch.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    store: Arc<RwLock<TtlStore<Value>>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.store.write().await.get(key)
    }

    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.store.write().await.set(key, value, ttl);
    }

    pub async fn delete(&self, key: &str) {
        self.store.write().await.delete(key);
    }

    /// Removes every entry under `prefix`, returning how many were dropped.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.store.write().await.invalidate_prefix(prefix)
    }

    /// Removes the entry at `exact` and every entry under `prefix`.
    pub async fn invalidate_scope(&self, exact: &str, prefix: &str) -> usize {
        self.store.write().await.invalidate_scope(exact, prefix)
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.store.read().await.contains_key(key)
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    // == Read Through ==
    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result for `ttl`.
    ///
    /// A failed fetch is returned as-is and leaves the cache untouched.
    /// Concurrent misses on the same key each run their own fetch.
    pub async fn read_through<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cached = self.get(key).await;
        if let Some(value) = cached {
            debug!(key, "cache hit");
            return serde_json::from_value(value)
                .map_err(|e| E::from(CacheError::Codec(e)));
        }

        debug!(key, "cache miss");
        let fetched = fetch().await?;

        let value = serde_json::to_value(&fetched).map_err(|e| E::from(CacheError::Codec(e)))?;
        self.set(key, value, ttl).await;

        Ok(fetched)
    }

    // == Get Or Fetch ==
    /// Read-through for a resource class: derives the key from the tenant
    /// and pagination window and uses the class TTL.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        resource: ResourceClass,
        tenant: &TenantScope,
        page: Option<Pagination>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = build_key(resource, tenant, page);
        self.read_through(&key, resource.ttl(), fetch).await
    }
}
