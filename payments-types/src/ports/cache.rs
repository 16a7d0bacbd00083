//! Idempotency cache port.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store with TTL used to short-circuit replays.
///
/// The cache is an accelerator: the record store stays authoritative.
#[async_trait::async_trait]
pub trait IdempotencyCache: Send + Sync + 'static {
    /// Returns the live value for `key`; expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` unless a live entry already exists for `key`.
    /// Returns `true` when this call wrote the entry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError>;
}
