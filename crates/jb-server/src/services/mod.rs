//! Bundle cache backends.

pub mod bundle_cache;
pub mod redis_cache;
