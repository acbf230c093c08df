//! TTL cache with bounded size and an optional durable store.
//!
//! - `get_or_load` is the read-through entry point
//! - Expired entries are logically absent; a periodic sweep removes them
//! - After every insert the oldest 10% (by insertion time) are trimmed once
//!   the entry count exceeds `max_entries`
//! - On a memory miss the durable store is consulted; stored data counts
//!   only while its own `refreshed_at` is within the caller's TTL
//! - Durable rows are keyed `<cache name>:<key>` and keep the source block,
//!   so a reorg purge reaches them too
//!
//! There is no stampede protection: concurrent misses on one key may each
//! run the loader. Loaders are idempotent reads.

mod entry;
mod store;


pub use store::{CacheStore, PgCacheStore, StoredEntry};

use entry::CacheEntry;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vigil_types::{CacheConfig, CacheStats, ResilienceError};

use crate::metrics::{self, CacheEvent};
use crate::scheduler::PeriodicTask;

const MIN_TTL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    durable_hits: AtomicU64,
    evictions: AtomicU64,
    stale_served: AtomicU64,
}

#[derive(Debug)]
pub struct TtlCache<V> {
    name: String,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    config: CacheConfig,
    store: Option<Arc<dyn CacheStore>>,
    next_seq: AtomicU64,
    counters: Counters,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            config,
            store: None,
            next_seq: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        tracing::info!("[{}] durable store configured", self.name);
        self.store = Some(store);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let found = self.entries.read().get(key).filter(|e| e.is_fresh(now)).map(|e| e.value.clone());
        self.count_lookup(found.is_some());
        found
    }

    /// Fresh value sourced at chain height `min_block` or later.
    pub fn get_at_block(&self, key: &str, min_block: u64) -> Option<V> {
        let now = Instant::now();
        let found = self
            .entries
            .read()
            .get(key)
            .filter(|e| e.is_fresh(now) && e.satisfies_block(min_block))
            .map(|e| e.value.clone());
        self.count_lookup(found.is_some());
        found
    }

    /// Insert `value`; with a durable store the row is written in the background.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        self.persist_in_background(key, &value, None);
        self.insert(key, value, ttl, None);
    }

    /// Store a value whose validity is tied to the block it was read at.
    pub fn set_at_block(&self, key: &str, value: V, ttl: Duration, block: u64) {
        self.persist_in_background(key, &value, Some(block));
        self.insert(key, value, ttl, Some(block));
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every entry sourced at or above `block` (chain reorg).
    ///
    /// The durable store is purged in the background.
    pub fn invalidate_from_block(&self, block: u64) -> usize {
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, e| e.source_block.is_none_or(|b| b < block));
            before - entries.len()
        };

        if let Some(store) = self.store.clone() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let name = self.name.clone();
                handle.spawn(async move {
                    if let Err(e) = store.delete_from_block(block).await {
                        tracing::warn!("[{}] durable invalidation from block {} failed: {}", name, block, e);
                    }
                });
            }
        }

        if removed > 0 {
            tracing::info!("[{}] invalidated {} entries from block {}", self.name, removed, block);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Return the cached value if fresh, otherwise run `loader`, cache and return its result.
    ///
    /// Loader errors propagate unless `serve_stale_on_error` is enabled and
    /// an expired entry is still present.
    pub async fn get_or_load<F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<V, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ResilienceError>>,
    {
        self.get_or_load_at_block(key, ttl, move || async move { loader().await.map(|value| (value, None)) }).await
    }

    /// [`Self::get_or_load`] for chain data: the loader also returns the block
    /// its value was read at, which is kept in memory and in the durable row.
    pub async fn get_or_load_at_block<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<V, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Option<u64>), ResilienceError>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        if let Some(value) = self.load_durable(key, ttl).await {
            return Ok(value);
        }

        match loader().await {
            Ok((value, source_block)) => {
                self.counters.loads.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_event(&self.name, CacheEvent::Load);
                self.insert(key, value.clone(), ttl, source_block);
                self.persist(key, &value, source_block).await;
                Ok(value)
            },
            Err(e) => {
                if self.config.serve_stale_on_error {
                    if let Some(stale) = self.entries.read().get(key).map(|entry| entry.value.clone()) {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        metrics::record_cache_event(&self.name, CacheEvent::StaleServed);
                        tracing::warn!("[{}] refresh of {} failed, serving stale value: {}", self.name, key, e);
                        return Ok(stale);
                    }
                }
                Err(e)
            },
        }
    }

    async fn load_durable(&self, key: &str, ttl: Duration) -> Option<V> {
        let store = self.store.as_ref()?;
        let stored = match store.load(&self.store_key(key)).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!("[{}] durable lookup of {} failed: {}", self.name, key, e);
                return None;
            },
        };

        let remaining = stored.remaining_ttl(ttl, chrono::Utc::now())?;
        let value: V = match serde_json::from_value(stored.value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[{}] durable entry {} is not decodable: {}", self.name, key, e);
                return None;
            },
        };

        self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_event(&self.name, CacheEvent::DurableHit);
        tracing::debug!("[{}] {} -> durable HIT ({}ms left)", self.name, key, remaining.as_millis());
        self.insert(key, value.clone(), remaining, stored.source_block);
        Some(value)
    }

    /// Key of `key`'s durable row. Caches sharing one store never collide.
    fn store_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    fn stored_entry(&self, key: &str, value: &V, source_block: Option<u64>) -> Option<StoredEntry> {
        match serde_json::to_value(value) {
            Ok(json) => Some(StoredEntry::new(json, source_block)),
            Err(e) => {
                tracing::warn!("[{}] cannot serialize {} for durable store: {}", self.name, key, e);
                None
            },
        }
    }

    async fn persist(&self, key: &str, value: &V, source_block: Option<u64>) {
        let Some(store) = &self.store else {
            return;
        };
        let Some(entry) = self.stored_entry(key, value, source_block) else {
            return;
        };
        if let Err(e) = store.save(&self.store_key(key), &entry).await {
            tracing::warn!("[{}] durable write of {} failed: {}", self.name, key, e);
        }
    }

    /// Write-through for the synchronous setters. Skipped outside a runtime.
    fn persist_in_background(&self, key: &str, value: &V, source_block: Option<u64>) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("[{}] no runtime, {} not written to durable store", self.name, key);
            return;
        };
        let Some(entry) = self.stored_entry(key, value, source_block) else {
            return;
        };
        let name = self.name.clone();
        let key = key.to_string();
        let store_key = self.store_key(&key);
        handle.spawn(async move {
            if let Err(e) = store.save(&store_key, &entry).await {
                tracing::warn!("[{}] durable write of {} failed: {}", name, key, e);
            }
        });
    }

    fn insert(&self, key: &str, value: V, ttl: Duration, source_block: Option<u64>) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            cached_at: now,
            expires_at: now + ttl.max(MIN_TTL),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            source_block,
        };

        let evicted = {
            let mut entries = self.entries.write();
            entries.insert(key.to_string(), entry);
            self.trim(&mut entries)
        };

        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            metrics::record_cache_events(&self.name, CacheEvent::Eviction, evicted as u64);
            tracing::debug!("[{}] size limit reached, evicted {} oldest entries", self.name, evicted);
        }
    }

    /// Evict the oldest 10% (at least enough to get back under the limit).
    fn trim(&self, entries: &mut HashMap<String, CacheEntry<V>>) -> usize {
        let max = self.config.max_entries;
        if entries.len() <= max {
            return 0;
        }
        let count = entries.len().div_ceil(10).max(entries.len() - max);

        let mut by_age: Vec<((Instant, u64), String)> =
            entries.iter().map(|(k, e)| (e.age_key(), k.clone())).collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(count) {
            entries.remove(&key);
        }
        count
    }

    /// Remove expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, e| e.is_fresh(now));
            before - entries.len()
        };
        if removed > 0 {
            self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::record_cache_events(&self.name, CacheEvent::Eviction, removed as u64);
            tracing::debug!("[{}] sweep removed {} expired entries", self.name, removed);
        }
        removed
    }

    /// Sweep expired entries every `sweep_interval` until `cancel` fires.
    pub fn start_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> PeriodicTask {
        let cache = Arc::clone(self);
        PeriodicTask::spawn(
            format!("{}-sweeper", self.name),
            self.config.sweep_interval(),
            cancel,
            move || {
                let cache = Arc::clone(&cache);
                async move {
                    cache.sweep_expired();
                }
            },
        )
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
        }
    }

    /// Physical entry count, including expired entries awaiting the sweep.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn count_lookup(&self, hit: bool) {
        if hit {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_event(&self.name, CacheEvent::Hit);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_event(&self.name, CacheEvent::Miss);
        }
    }
}
