//! Cache layer: deterministic keys, read-through lookups and prefix-scoped
//! invalidation on top of the [`FastStore`](crate::ports::FastStore) port.

mod invalidation;
mod keys;
mod read_through;

use std::time::Duration;

pub use invalidation::{Invalidation, InvalidationMode, Invalidator};
pub use keys::{CacheKey, KeyPattern};
pub use read_through::ReadThrough;

/// Expiry and invalidation settings shared by the cache-backed services.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL of article, category and comment projections.
    pub content_ttl: Duration,
    /// TTL of like counters and like-user sets.
    pub likes_ttl: Duration,
    /// Keys requested per scan step during invalidation.
    pub scan_batch: usize,
    pub invalidation: InvalidationMode,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            content_ttl: Duration::from_secs(10 * 60),
            likes_ttl: Duration::from_secs(24 * 60 * 60),
            scan_batch: 100,
            invalidation: InvalidationMode::Background,
        }
    }
}
