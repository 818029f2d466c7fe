//! Content-derived bundle identity.

use std::fmt;

use sha2::{Digest, Sha256};

use super::ValidatedFileSet;

/// Lowercase hex SHA-256 of the canonical file-set string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a file set. Entries are sorted by url first, so
    /// request order does not matter.
    pub fn derive(files: &ValidatedFileSet) -> Self {
        let canonical = files
            .sorted_by_url()
            .iter()
            .map(|f| format!("{}|{}", f.url, f.filename))
            .collect::<Vec<_>>()
            .join("\n");

        Self(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
