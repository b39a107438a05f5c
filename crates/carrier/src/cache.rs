//! Time-boxed cache for carrier master data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

/// TTL cache keyed by logical request (e.g. `"provinces"`,
/// `"districts:201"`).
///
/// Entries past their TTL are treated as absent on read; the caller falls
/// through to a live carrier call and re-inserts. `sweep_expired` drops stale
/// entries opportunistically.
#[derive(Clone)]
pub struct TtlCache<T> {
    entries: Arc<RwLock<HashMap<String, Entry<T>>>>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    /// Creates a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the cached value for `key` unless it has expired.
    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Inserts a value with a fresh TTL.
    pub async fn insert(&self, key: impl Into<String>, value: T) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops every expired entry; returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
