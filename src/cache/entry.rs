//! Cache Entry Module
//!
//! Defines a single cached value together with its expiry instant.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A cached value and the instant after which it is no longer served.
///
/// Uses `tokio::time::Instant` so expiry follows the runtime clock, which
/// tests can pause and advance.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Last instant at which the value is still fresh
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that stays fresh for `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: the entry is still fresh at exactly `expires_at`
    /// and expired strictly after it.
    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}
