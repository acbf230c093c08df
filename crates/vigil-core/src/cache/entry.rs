use tokio::time::Instant;

/// In-memory cache entry with TTL and optional chain height.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) cached_at: Instant,
    pub(crate) expires_at: Instant,
    /// Insertion order; breaks `cached_at` ties when trimming
    pub(crate) seq: u64,
    pub(crate) source_block: Option<u64>,
}

impl<V> CacheEntry<V> {
    /// An entry is logically absent once `now > expires_at`.
    pub(crate) fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    /// Entries without a recorded height never satisfy a height requirement.
    pub(crate) fn satisfies_block(&self, min_block: u64) -> bool {
        self.source_block.is_some_and(|block| block >= min_block)
    }

    pub(crate) fn age_key(&self) -> (Instant, u64) {
        (self.cached_at, self.seq)
    }
}
