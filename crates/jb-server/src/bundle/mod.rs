//! Bundle pipeline: validated file sets in, cached ZIP archives out.
//!
//! validate → key → cache lookup → (fetch → archive → detached store) → response

pub mod archive;
pub mod fetch;
pub mod key;
pub mod pipeline;
pub mod response;
pub mod validate;

use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use key::CacheKey;
pub use pipeline::BundleService;
pub use validate::Validator;

/// One requested file after validation and filename normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub url: String,
    pub filename: String,
}

/// Non-empty list of validated files, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFileSet(Vec<FileRequest>);

impl ValidatedFileSet {
    /// Only the validator builds sets, so emptiness is ruled out there.
    pub(crate) fn new(files: Vec<FileRequest>) -> Self {
        debug_assert!(!files.is_empty());
        Self(files)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileRequest> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Copy of the entries ordered by url, then filename.
    pub fn sorted_by_url(&self) -> Vec<&FileRequest> {
        let mut sorted: Vec<&FileRequest> = self.0.iter().collect();
        sorted.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.filename.cmp(&b.filename)));
        sorted
    }
}

/// An assembled archive as kept in the bundle cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBundle {
    pub bytes: Bytes,
    /// Quoted ETag derived from `bytes`.
    pub etag: String,
    pub created_at: DateTime<Utc>,
}

impl CachedBundle {
    /// Wrap freshly assembled archive bytes, computing their ETag.
    pub fn from_archive(bytes: Vec<u8>) -> Self {
        let etag = archive::integrity_tag(&bytes);
        Self {
            bytes: Bytes::from(bytes),
            etag,
            created_at: Utc::now(),
        }
    }
}

/// A fetched file waiting to be packed.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Bytes,
}
