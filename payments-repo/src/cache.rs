//! In-process idempotency cache with per-entry TTL.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use payments_types::{CacheError, IdempotencyCache};

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// `DashMap`-backed [`IdempotencyCache`].
///
/// Entries are write-once while live. Expired entries read as absent and are
/// replaced by the next `set`; [`purge_expired`](Self::purge_expired) drops
/// them in bulk.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl IdempotencyCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let fresh = CacheEntry {
            value,
            expires_at: now + ttl,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }
}
