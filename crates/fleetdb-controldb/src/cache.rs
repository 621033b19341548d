//! LRU-bounded read-writer handle cache
//!
//! Bounds the number of live `RecordIo` handles (and thus open-file and
//! memory usage) while keeping hot keys resident. The cache owns only
//! handles, never data: evicting an entry drops the in-memory handle and
//! leaves the persisted log untouched, so eviction is invisible to
//! correctness.
//!
//! Eviction of a key with an operation in flight is deferred: a handle
//! with outstanding references stays resident, so every concurrent
//! operation for that key keeps going through the same per-key lock.
//! Evicting it early would let a later access build a second handle for
//! the same key and run CAS against it concurrently. The cache may
//! briefly exceed capacity when every candidate is busy.

use crate::codec::LogRecord;
use crate::rw::RecordIo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

struct CacheSlot<R: LogRecord> {
    handle: Arc<RecordIo<R>>,
    /// Logical clock value at last access, for LRU ordering
    last_access: u64,
}

/// Fixed-capacity storage-key → read-writer cache with LRU eviction.
pub struct HandleCache<R: LogRecord> {
    entries: Mutex<HashMap<String, CacheSlot<R>>>,
    capacity: usize,
    clock: AtomicU64,
    stats: CacheStats,
}

impl<R: LogRecord> HandleCache<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Return the cached handle for `key`, marking it most recently
    /// used, or build one with `make` and insert it. Handle construction
    /// must be cheap (no I/O) since it runs under the cache lock; the
    /// log opens lazily under the handle's own per-key lock. If the
    /// insert pushes the cache over capacity, least-recently-used
    /// entries are dropped.
    pub fn get_or_create(
        &self,
        key: &str,
        make: impl FnOnce() -> RecordIo<R>,
    ) -> Arc<RecordIo<R>> {
        let clock = self.tick();
        let mut entries = self.entries.lock();

        if let Some(slot) = entries.get_mut(key) {
            slot.last_access = clock;
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&slot.handle);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(make());
        entries.insert(
            key.to_string(),
            CacheSlot {
                handle: Arc::clone(&handle),
                last_access: clock,
            },
        );

        while entries.len() > self.capacity {
            // only idle handles are eviction candidates; the cache holds
            // exactly one reference to an idle handle
            let lru = entries
                .iter()
                .filter(|(_, slot)| Arc::strong_count(&slot.handle) == 1)
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(k, _)| k.clone());
            match lru {
                Some(k) => {
                    entries.remove(&k);
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
                // every entry is mid-operation; stay over capacity until
                // the next insert retries
                None => break,
            }
        }

        handle
    }

    /// Explicitly drop the entry for `key`, so the next access rebuilds
    /// a fresh handle from disk. Called after deletes, whatever their
    /// outcome, so a stale handle cannot mask the deletion.
    pub fn remove(&self, key: &str) -> Option<Arc<RecordIo<R>>> {
        self.entries.lock().remove(key).map(|slot| slot.handle)
    }

    /// Whether `key` is currently cache-resident (does not touch
    /// recency).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
