//! Cache-or-build orchestration.
//!
//! Concurrent misses for the same key share one build (single-flight); the
//! cache write is detached from the response path.

use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::archive::{self, AssemblyError};
use super::fetch::{self, FetchError, FileSource};
use super::{CacheKey, CachedBundle, ValidatedFileSet};
use crate::services::bundle_cache::BundleCache;
use crate::workers::TaskRunner;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to assemble archive: {0}")]
    Assembly(#[from] AssemblyError),
}

/// Result of one build, shared by every request waiting on it.
type SharedBuild = Result<CachedBundle, Arc<BundleError>>;

/// Drops this request's single-flight entry when it finishes or is
/// cancelled. A newer entry under the same key is left alone.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<CacheKey, Arc<OnceCell<SharedBuild>>>,
    key: &'a CacheKey,
    cell: &'a Arc<OnceCell<SharedBuild>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, self.cell));
    }
}

pub struct BundleService {
    cache: Arc<dyn BundleCache>,
    source: Arc<dyn FileSource>,
    tasks: TaskRunner,
    in_flight: DashMap<CacheKey, Arc<OnceCell<SharedBuild>>>,
}

impl BundleService {
    pub fn new(cache: Arc<dyn BundleCache>, source: Arc<dyn FileSource>, tasks: TaskRunner) -> Self {
        Self {
            cache,
            source,
            tasks,
            in_flight: DashMap::new(),
        }
    }

    /// Return the cached bundle for `files`, building it on a miss.
    pub async fn get_or_build(&self, files: &ValidatedFileSet) -> SharedBuild {
        let key = CacheKey::derive(files);

        if let Some(bundle) = self.lookup(&key).await {
            tracing::info!(key = %key, files = files.len(), hit = true, "Serving cached bundle");
            return Ok(bundle);
        }

        let cell = self.in_flight.entry(key.clone()).or_default().clone();
        let _release = InFlightGuard {
            in_flight: &self.in_flight,
            key: &key,
            cell: &cell,
        };

        let result = cell.get_or_init(|| self.build(&key, files)).await.clone();
        result
    }

    /// Cache lookup with every error degraded to a miss.
    async fn lookup(&self, key: &CacheKey) -> Option<CachedBundle> {
        match self.cache.lookup(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Bundle cache lookup failed, rebuilding");
                None
            }
        }
    }

    async fn build(&self, key: &CacheKey, files: &ValidatedFileSet) -> SharedBuild {
        tracing::info!(key = %key, files = files.len(), hit = false, "Building bundle");

        let downloaded = fetch::fetch_all(self.source.as_ref(), files)
            .await
            .map_err(|e| Arc::new(BundleError::from(e)))?;
        let bundle = archive::build_bundle(downloaded)
            .await
            .map_err(|e| Arc::new(BundleError::from(e)))?;

        let cache = self.cache.clone();
        let (store_key, stored) = (key.clone(), bundle.clone());
        self.tasks.spawn("bundle-cache-store", async move {
            cache
                .store(&store_key, &stored)
                .await
                .with_context(|| format!("storing bundle {}", store_key))
        });

        tracing::info!(key = %key, bytes = bundle.bytes.len(), etag = %bundle.etag, "Bundle built");
        Ok(bundle)
    }
}
