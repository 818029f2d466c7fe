//! Redis-backed bundle cache.
//!
//! One hash per bundle under `<key_prefix><cache key>`:
//! `body` (archive bytes), `etag`, `created_at` (RFC 3339).
//! Redis key expiry owns eviction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

use super::bundle_cache::{BundleCache, CacheError};
use crate::bundle::archive::integrity_tag;
use crate::bundle::{CacheKey, CachedBundle};
use jb_common::config::CacheConfig;

const FIELD_BODY: &str = "body";
const FIELD_ETAG: &str = "etag";
const FIELD_CREATED_AT: &str = "created_at";

type RawEntry = (Option<Vec<u8>>, Option<String>, Option<String>);

pub struct RedisBundleCache {
    redis: redis::aio::ConnectionManager,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisBundleCache {
    pub fn new(redis: redis::aio::ConnectionManager, config: &CacheConfig) -> Self {
        Self {
            redis,
            key_prefix: config.key_prefix.clone(),
            ttl_secs: config.ttl_secs,
        }
    }

    /// Synthetic lookup identifier for a bundle.
    fn entry_id(&self, key: &CacheKey) -> String {
        format!("{}{}", self.key_prefix, key.as_str())
    }
}

#[async_trait]
impl BundleCache for RedisBundleCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedBundle>, CacheError> {
        let id = self.entry_id(key);
        let mut redis = self.redis.clone();
        let raw: RawEntry = redis
            .hget(&id, &[FIELD_BODY, FIELD_ETAG, FIELD_CREATED_AT])
            .await?;

        decode_entry(&id, raw)
    }

    async fn store(&self, key: &CacheKey, bundle: &CachedBundle) -> Result<(), CacheError> {
        let id = self.entry_id(key);
        let mut redis = self.redis.clone();

        let _: () = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&id)
            .arg(FIELD_BODY)
            .arg(&bundle.bytes[..])
            .arg(FIELD_ETAG)
            .arg(&bundle.etag)
            .arg(FIELD_CREATED_AT)
            .arg(bundle.created_at.to_rfc3339())
            .ignore()
            .expire(&id, expire_secs(self.ttl_secs))
            .ignore()
            .query_async(&mut redis)
            .await?;

        tracing::info!(key = %key, bytes = bundle.bytes.len(), ttl_secs = self.ttl_secs, "Bundle cached");
        Ok(())
    }
}

/// `EXPIRE` takes a signed count; oversized TTLs saturate instead of wrapping
/// negative, which would delete the key at once.
fn expire_secs(ttl_secs: u64) -> i64 {
    i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

/// Turn the three hash fields into a bundle. All absent is a miss; anything
/// partial, unparseable or failing the ETag check is corrupt.
fn decode_entry(id: &str, raw: RawEntry) -> Result<Option<CachedBundle>, CacheError> {
    let corrupt = |reason: &str| CacheError::Corrupt {
        key: id.to_string(),
        reason: reason.to_string(),
    };

    let (body, etag, created_at) = match raw {
        (None, None, None) => return Ok(None),
        (Some(body), Some(etag), Some(created_at)) => (body, etag, created_at),
        _ => return Err(corrupt("missing fields")),
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|_| corrupt("bad created_at"))?
        .with_timezone(&Utc);

    if integrity_tag(&body) != etag {
        return Err(corrupt("etag mismatch"));
    }

    Ok(Some(CachedBundle {
        bytes: body.into(),
        etag,
        created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bundle: &CachedBundle) -> RawEntry {
        (
            Some(bundle.bytes.to_vec()),
            Some(bundle.etag.clone()),
            Some(bundle.created_at.to_rfc3339()),
        )
    }

    #[test]
    fn test_decode_round_trip() {
        let bundle = CachedBundle::from_archive(b"zip-bytes".to_vec());
        let decoded = decode_entry("jb:bundle:k", raw(&bundle)).unwrap().unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_expire_secs_saturates() {
        assert_eq!(expire_secs(31_536_000), 31_536_000);
        assert_eq!(expire_secs(u64::MAX), i64::MAX);
        assert_eq!(expire_secs(i64::MAX as u64 + 1), i64::MAX);
    }

    #[test]
    fn test_decode_miss() {
        assert!(decode_entry("jb:bundle:k", (None, None, None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_rejects_partial_and_tampered_entries() {
        let bundle = CachedBundle::from_archive(b"zip-bytes".to_vec());

        let (body, etag, _) = raw(&bundle);
        let partial = decode_entry("jb:bundle:k", (body, etag, None));
        assert!(matches!(partial, Err(CacheError::Corrupt { .. })));

        let (_, etag, created) = raw(&bundle);
        let tampered = decode_entry("jb:bundle:k", (Some(b"other".to_vec()), etag, created));
        assert!(matches!(tampered, Err(CacheError::Corrupt { .. })));

        let (body, etag, _) = raw(&bundle);
        let bad_time = decode_entry("jb:bundle:k", (body, etag, Some("yesterday".into())));
        assert!(matches!(bad_time, Err(CacheError::Corrupt { .. })));
    }
}
