//! Cache-aware access to document replicas.

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use super::cache::{ReplicaCache, Slot, SlotState, WriteTicket};
use super::replica::ContentReplica;
use crate::error::Result;
use crate::rich_text::{RichTextNode, normalize, validate_document};

/// Converts between trees and replicated state for one store, keeping the
/// live replicas it touches in a [`ReplicaCache`].
///
/// Keys are opaque strings; the store uses `"<collection>/<id>"`.
pub struct CrdtAdapter {
    cache: ReplicaCache,
}

impl Default for CrdtAdapter {
    fn default() -> Self {
        Self::new(ReplicaCache::default())
    }
}

impl CrdtAdapter {
    /// Create an adapter owning `cache`.
    pub fn new(cache: ReplicaCache) -> Self {
        Self { cache }
    }

    /// Create an adapter with a fresh cache of the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(ReplicaCache::new(capacity))
    }

    /// The replica cache.
    pub fn cache(&self) -> &ReplicaCache {
        &self.cache
    }

    /// Open a read session on `key`.
    ///
    /// Waits for an in-flight write on the same key to finish.
    pub async fn read(&self, key: &str) -> ReadSession {
        let slot = self.cache.slot(key);
        let guard = slot.clone().read_owned().await;
        ReadSession {
            key: key.to_string(),
            slot,
            guard,
        }
    }

    /// Open a write session on `key`.
    ///
    /// Waits for other sessions on the same key, then registers as its writer.
    pub async fn write(&self, key: &str) -> Result<WriteSession<'_>> {
        let slot = self.cache.slot(key);
        let guard = slot.write_owned().await;
        let ticket = self.cache.begin_write(key)?;
        Ok(WriteSession {
            key: key.to_string(),
            ticket: Some(ticket),
            guard,
            staged: false,
        })
    }

    /// Drop the cached replica for `key` once nobody is using it.
    pub async fn evict(&self, key: &str) {
        let slot = self.cache.slot(key);
        let _guard = slot.write().await;
        self.cache.remove(key);
    }
}

/// Shared access to one document's slot.
pub struct ReadSession {
    key: String,
    slot: Slot,
    guard: OwnedRwLockReadGuard<SlotState>,
}

impl ReadSession {
    /// Materialize `stored`, the bytes just loaded from storage.
    ///
    /// Uses the live replica when it was persisted as exactly `stored`,
    /// otherwise decodes `stored` and installs it in the cache if the slot is
    /// free.
    pub fn materialize(self, stored: &[u8]) -> Result<RichTextNode> {
        if self.guard.matches(stored)
            && let Some(replica) = self.guard.replica.as_ref()
        {
            return replica.to_tree();
        }

        let ReadSession {
            key,
            slot,
            guard,
        } = self;
        let stale = guard.persisted.is_some();
        drop(guard);

        let replica = ContentReplica::from_state(&key, stored)?;
        let tree = replica.to_tree()?;

        // Someone else holds the slot: leave it to them.
        if let Ok(mut state) = slot.try_write() {
            if stale {
                log::debug!("Reloading stale replica {} from storage", key);
            }
            state.replica = Some(replica);
            state.persisted = Some(stored.to_vec());
        }
        Ok(tree)
    }
}

/// Exclusive access to one document's live replica.
///
/// Changes are staged on the live replica, persisted by the caller and then
/// committed. A session dropped with staged but uncommitted changes rebuilds
/// the replica from the last persisted bytes, so a failed or cancelled write
/// never leaves unpersisted state in the cache.
pub struct WriteSession<'a> {
    key: String,
    // Unregisters before the slot lock is released.
    ticket: Option<WriteTicket<'a>>,
    guard: OwnedRwLockWriteGuard<SlotState>,
    staged: bool,
}

impl WriteSession<'_> {
    /// The document key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Align the live replica with `stored`, the bytes currently in storage.
    ///
    /// `None` means the document does not exist yet and starts from an empty
    /// replica.
    pub fn load(&mut self, stored: Option<&[u8]>) -> Result<()> {
        match stored {
            Some(bytes) => {
                if !self.guard.matches(bytes) {
                    if self.guard.persisted.is_some() {
                        log::debug!("Replica {} is stale, reloading from storage", self.key);
                    }
                    self.guard.replica = Some(ContentReplica::from_state(&self.key, bytes)?);
                    self.guard.persisted = Some(bytes.to_vec());
                }
            }
            None => {
                self.guard.replica = Some(ContentReplica::new());
                self.guard.persisted = None;
            }
        }
        Ok(())
    }

    /// Replace the content with `tree` and return the new state bytes.
    pub fn stage_tree(&mut self, tree: &RichTextNode) -> Result<Vec<u8>> {
        validate_document(tree)?;
        let tree = normalize(tree);
        self.staged = true;
        let replica = self.replica();
        replica.replace_tree(&tree)?;
        Ok(replica.encode_state())
    }

    /// Merge a state produced by another replica and return the new state
    /// bytes.
    pub fn stage_merge(&mut self, remote: &[u8]) -> Result<Vec<u8>> {
        // Decode before touching the live replica.
        ContentReplica::from_state(&self.key, remote)?;
        self.staged = true;
        let key = &self.key;
        let replica = self.guard.replica.get_or_insert_with(ContentReplica::new);
        replica.apply_state(key, remote)?;
        Ok(replica.encode_state())
    }

    /// Tree currently held by the live replica.
    pub fn tree(&self) -> Result<RichTextNode> {
        match self.guard.replica.as_ref() {
            Some(replica) => replica.to_tree(),
            None => ContentReplica::new().to_tree(),
        }
    }

    /// Mark `persisted` as durably stored and keep the live replica.
    pub fn commit(mut self, persisted: Vec<u8>) {
        self.guard.persisted = Some(persisted);
        self.staged = false;
    }

    fn replica(&mut self) -> &ContentReplica {
        self.guard.replica.get_or_insert_with(ContentReplica::new)
    }

    fn rollback(&mut self) {
        log::warn!("Rolling back unpersisted changes to {}", self.key);
        self.guard.replica = match self.guard.persisted.as_deref() {
            Some(bytes) => match ContentReplica::from_state(&self.key, bytes) {
                Ok(replica) => Some(replica),
                Err(e) => {
                    log::warn!("Dropping replica {} after failed rollback: {}", self.key, e);
                    None
                }
            },
            None => None,
        };
    }
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        if self.staged {
            self.rollback();
        }
        self.ticket.take();
    }
}
