//! Bounded cache of live replicas.
//!
//! Each document key maps to a slot guarded by an async `RwLock`. The slot lock
//! is the per-document mutex: writers hold it across stage, persist and commit,
//! readers share it. Slots are kept in least-recently-used order and only slots
//! nobody holds are evicted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::replica::ContentReplica;
use crate::error::{FolioError, Result};

/// Default number of live replicas kept per store.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Contents of one cache slot.
#[derive(Default)]
pub(crate) struct SlotState {
    /// Live replica, if loaded.
    pub replica: Option<ContentReplica>,
    /// Bytes the live replica was last persisted as.
    pub persisted: Option<Vec<u8>>,
}

impl SlotState {
    /// True when the live replica reflects exactly `stored`.
    pub fn matches(&self, stored: &[u8]) -> bool {
        self.replica.is_some() && self.persisted.as_deref() == Some(stored)
    }
}

pub(crate) type Slot = Arc<RwLock<SlotState>>;

#[derive(Default)]
struct CacheInner {
    slots: IndexMap<String, Slot>,
    writers: HashSet<String>,
}

/// Live replica cache owned by one store.
///
/// ```ignore
/// let cache = ReplicaCache::new(16);
/// assert!(cache.is_empty());
/// ```
pub struct ReplicaCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl Default for ReplicaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ReplicaCache {
    /// Create a cache holding at most `capacity` idle replicas.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Maximum number of idle slots kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently cached.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// True when no slot is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `key` has a slot.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().slots.contains_key(key)
    }

    /// Keys in least-recently-used order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().slots.keys().cloned().collect()
    }

    /// Drop the slot for `key`. Returns whether one was cached.
    ///
    /// Callers that may race with writers on the same key must hold the slot's
    /// write lock while removing it.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.lock().slots.shift_remove(key).is_some();
        if removed {
            log::debug!("Removed replica cache slot {}", key);
        }
        removed
    }

    /// Drop every idle slot.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Get the slot for `key`, creating it if needed, and mark it most
    /// recently used.
    pub(crate) fn slot(&self, key: &str) -> Slot {
        let mut inner = self.lock();

        if let Some(index) = inner.slots.get_index_of(key) {
            let last = inner.slots.len() - 1;
            inner.slots.move_index(index, last);
            return Arc::clone(&inner.slots[last]);
        }

        let slot: Slot = Arc::new(RwLock::new(SlotState::default()));
        inner.slots.insert(key.to_string(), Arc::clone(&slot));
        self.evict_idle(&mut inner);
        slot
    }

    /// Register an in-flight writer for `key`.
    ///
    /// Fails with [`FolioError::ConcurrentWriteConflict`] when another writer
    /// is already registered, which means two writers got hold of the same
    /// document at once.
    pub(crate) fn begin_write(&self, key: &str) -> Result<WriteTicket<'_>> {
        let mut inner = self.lock();
        if !inner.writers.insert(key.to_string()) {
            log::warn!("Concurrent write detected on {}", key);
            return Err(FolioError::ConcurrentWriteConflict(key.to_string()));
        }
        Ok(WriteTicket {
            cache: self,
            key: key.to_string(),
        })
    }

    fn evict_idle(&self, inner: &mut CacheInner) {
        while inner.slots.len() > self.capacity {
            // The newest slot is never evicted.
            let newest = inner.slots.len() - 1;
            let victim = inner
                .slots
                .values()
                .take(newest)
                .position(|slot| Arc::strong_count(slot) == 1);
            match victim {
                Some(index) => {
                    if let Some((key, _)) = inner.slots.shift_remove_index(index) {
                        log::debug!("Evicted replica {} from cache", key);
                    }
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration of one in-flight writer. Unregisters on drop.
pub(crate) struct WriteTicket<'a> {
    cache: &'a ReplicaCache,
    key: String,
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.cache.lock().writers.remove(&self.key);
    }
}
