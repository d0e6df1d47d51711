use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use tokio::{task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Expiry and capacity rules for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

impl CachePolicy {
    /// Scraped page content: pages change, so staleness is bounded to an hour.
    pub const fn content() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_entries: 1000,
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }

    /// Finished transformations: the expensive step, kept for a day.
    pub const fn transform() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: 5000,
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Read-only snapshot of a cache's size and hit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

/// In-memory TTL cache with a hard cap on entry count.
///
/// Entries are never mutated in place: `set` replaces the whole entry and
/// restarts its TTL window. Expired entries read as absent immediately and are
/// physically removed lazily on access, by `purge_expired`, or by the sweeper.
///
/// Writers serialize on `order`, the insertion log used for eviction, so the
/// entry count never exceeds `max_entries`. Records whose entry has since been
/// replaced or removed are stale and skipped.
#[derive(Debug)]
pub struct CacheStore<V> {
    name: &'static str,
    policy: CachePolicy,
    entries: DashMap<String, CacheEntry<V>>,
    order: Mutex<VecDeque<(Instant, String)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            policy,
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns the value for `key` unless it is unknown or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        // The read guard must be dropped before any removal on the same shard.
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or fully replaces `key`, evicting the oldest entry when full.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let capacity = self.policy.max_entries.max(1);
        let mut order = self.lock_order();

        if !self.entries.contains_key(&key) && self.entries.len() >= capacity {
            self.purge_expired();
            while self.entries.len() >= capacity {
                if !self.evict_oldest(&mut order) {
                    break;
                }
            }
        }

        let now = Instant::now();
        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + self.policy.ttl,
            },
        );
        order.push_back((now, key));

        if order.len() > capacity.saturating_mul(2) {
            self.compact_order(&mut order);
        }
    }

    /// Drops every entry in this instance only.
    pub fn clear(&self) {
        let mut order = self.lock_order();
        let dropped = self.entries.len();
        self.entries.clear();
        order.clear();
        info!(cache = self.name, dropped, "cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn lock_order(&self) -> MutexGuard<'_, VecDeque<(Instant, String)>> {
        self.order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_oldest(&self, order: &mut VecDeque<(Instant, String)>) -> bool {
        while let Some((inserted_at, key)) = order.pop_front() {
            let evicted = self
                .entries
                .remove_if(&key, |_, entry| entry.inserted_at == inserted_at);
            if evicted.is_some() {
                debug!(cache = self.name, key = %key, "evicting oldest entry");
                return true;
            }
        }
        false
    }

    /// Drops stale records so overwrites of hot keys cannot grow the log.
    fn compact_order(&self, order: &mut VecDeque<(Instant, String)>) {
        order.retain(|(inserted_at, key)| {
            self.entries
                .get(key)
                .is_some_and(|entry| entry.inserted_at == *inserted_at)
        });
    }

    /// Spawns a task purging expired entries every `sweep_interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(cache.policy.sweep_interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(cache = cache.name, "sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(cache = cache.name, purged, "swept expired entries");
                        }
                    }
                }
            }
        })
    }
}
