//! Bundle cache abstraction and the in-process backend.
//!
//! Entries are keyed by `CacheKey` and never mutated: a different file set
//! always derives a different key. Callers treat every `CacheError` as a
//! miss (lookup) or a lost write (store).

use async_trait::async_trait;
use dashmap::DashMap;

use crate::bundle::{CacheKey, CachedBundle};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Key-addressed store of assembled archives.
#[async_trait]
pub trait BundleCache: Send + Sync {
    /// `Ok(None)` on a plain miss.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedBundle>, CacheError>;

    /// Idempotent for identical content.
    async fn store(&self, key: &CacheKey, bundle: &CachedBundle) -> Result<(), CacheError>;
}

/// Process-local cache. Nothing is evicted; use the Redis backend for
/// long-running deployments.
#[derive(Debug, Default)]
pub struct MemoryBundleCache {
    entries: DashMap<CacheKey, CachedBundle>,
}

impl MemoryBundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl BundleCache for MemoryBundleCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedBundle>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn store(&self, key: &CacheKey, bundle: &CachedBundle) -> Result<(), CacheError> {
        self.entries.insert(key.clone(), bundle.clone());
        Ok(())
    }
}
