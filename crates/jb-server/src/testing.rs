//! In-memory fakes shared by the unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bundle::fetch::{FetchFailure, FileSource};
use crate::bundle::{CacheKey, CachedBundle};
use crate::services::bundle_cache::{BundleCache, CacheError};

/// `FileSource` answering from a fixed table. Unknown URLs get a 404.
#[derive(Default)]
pub struct StaticSource {
    files: HashMap<String, Result<Bytes, FetchFailure>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, content: &[u8]) -> Self {
        self.files
            .insert(url.to_string(), Ok(Bytes::copy_from_slice(content)));
        self
    }

    pub fn with_failure(mut self, url: &str, failure: FetchFailure) -> Self {
        self.files.insert(url.to_string(), Err(failure));
        self
    }

    /// Sleep before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.files
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchFailure::Status(404)))
    }
}

/// Cache whose backend is always down.
pub struct FailingCache;

#[async_trait]
impl BundleCache for FailingCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedBundle>, CacheError> {
        Err(CacheError::Corrupt {
            key: key.to_string(),
            reason: "backend offline".into(),
        })
    }

    async fn store(&self, key: &CacheKey, _bundle: &CachedBundle) -> Result<(), CacheError> {
        Err(CacheError::Corrupt {
            key: key.to_string(),
            reason: "backend offline".into(),
        })
    }
}

/// (name, content) of every member of a ZIP, in archive order.
pub fn read_members(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut member = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            member.read_to_end(&mut content).unwrap();
            (member.name().to_string(), content)
        })
        .collect()
}
