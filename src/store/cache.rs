//! Time-bounded in-memory cache entries.

use std::time::{Duration, Instant};

/// A loaded collection plus the moment it was loaded.
///
/// The entry itself never expires; callers decide freshness by passing
/// the TTL they operate under.
#[derive(Debug)]
pub(crate) struct CacheEntry<T> {
    value: T,
    loaded_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            loaded_at: Instant::now(),
        }
    }

    /// The cached value, if still within `ttl` of its load time.
    pub fn fresh(&self, ttl: Duration) -> Option<&T> {
        if self.loaded_at.elapsed() < ttl {
            Some(&self.value)
        } else {
            None
        }
    }
}
