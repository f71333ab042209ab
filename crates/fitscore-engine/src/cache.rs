//! Stage result cache for the extraction stage.
//!
//! Keys are content fingerprints, so concurrent writers for the same key
//! write equivalent values. The pipeline treats every cache failure as a
//! miss (reads) or a no-op (writes); it must never fail because the cache
//! store is unavailable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::types::{ExtractionResult, Profile};

/// How many recent posts contribute to the fingerprint.
const FINGERPRINT_POSTS: usize = 5;

/// TTL-based key/value store for extraction results. The backing store is
/// swappable: in-memory for single-process deployments, a network KV for
/// shared ones; orchestration logic never changes.
#[async_trait]
pub trait ExtractionCache: Send + Sync {
    /// Fetch a cached value, `None` on miss or expiry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CacheUnavailable`] when the store cannot be
    /// reached; callers treat this as a miss.
    async fn get(&self, key: &str) -> Result<Option<ExtractionResult>, EngineError>;

    /// Store a value with the given time-to-live.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CacheUnavailable`] when the store cannot be
    /// reached; callers treat this as a no-op.
    async fn put(
        &self,
        key: &str,
        value: &ExtractionResult,
        ttl: Duration,
    ) -> Result<(), EngineError>;
}

/// Deterministic fingerprint of the extraction stage's salient inputs:
/// subject id, follower count, and the first five posts' id/like/comment
/// tuples. SHA-256, hex-encoded.
#[must_use]
pub fn extraction_fingerprint(profile: &Profile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile.subject_id.as_bytes());
    hasher.update([0]);
    hasher.update(profile.follower_count.to_be_bytes());
    for post in profile.recent_posts.iter().take(FINGERPRINT_POSTS) {
        hasher.update(post.id.as_bytes());
        hasher.update([0]);
        hasher.update(post.likes.to_be_bytes());
        hasher.update(post.comments.to_be_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// In-process cache with per-entry deadlines. Expired entries are dropped
/// lazily on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, ExtractionResult)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtractionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<ExtractionResult>, EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::CacheUnavailable(e.to_string()))?;
        match entries.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: &ExtractionResult,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::CacheUnavailable(e.to_string()))?;
        entries.insert(key.to_string(), (Instant::now() + ttl, value.clone()));
        Ok(())
    }
}
