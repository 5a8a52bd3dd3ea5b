//! Document store.
//!
//! Persists [`DocumentRecord`]s through a [`RecordBackend`]. A record's
//! `content` is stored as replicated state (`{"type": "crdt", "state": [..]}`)
//! and materialized through the store's [`CrdtAdapter`] on the way out.
//!
//! Every write to a document runs under that document's slot lock:
//! stage the change on the live replica, persist, then commit. A failed or
//! cancelled persist rolls the live replica back, so a read after a returned
//! `update` sees exactly what storage holds.

mod backend;
mod file_backend;
mod memory_backend;
mod record;
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
mod sqlite_backend;

pub use backend::{RecordBackend, record_key};
pub use file_backend::FileBackend;
pub use memory_backend::MemoryBackend;
pub use record::{DocumentPatch, DocumentRecord, NewDocument, Query};
#[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
pub use sqlite_backend::SqliteBackend;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::content::{ContentInput, CrdtPayload};
use crate::crdt::{CrdtAdapter, WriteSession};
use crate::error::{FolioError, Result};
use crate::rich_text::RichTextNode;
use record::StoredRecord;

/// CRUD over documents whose content is replicated state.
pub struct DocumentStore {
    backend: Arc<dyn RecordBackend>,
    adapter: CrdtAdapter,
}

impl DocumentStore {
    /// Create a store over `backend` with a default-sized replica cache.
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self::with_adapter(backend, CrdtAdapter::default())
    }

    /// Create a store over `backend` using `adapter` and its cache.
    pub fn with_adapter(backend: Arc<dyn RecordBackend>, adapter: CrdtAdapter) -> Self {
        Self { backend, adapter }
    }

    /// The record backend.
    pub fn backend(&self) -> &Arc<dyn RecordBackend> {
        &self.backend
    }

    /// The CRDT adapter owning the live replicas.
    pub fn adapter(&self) -> &CrdtAdapter {
        &self.adapter
    }

    /// Create a document. Content defaults to an empty document.
    pub async fn create(&self, collection: &str, data: NewDocument) -> Result<DocumentRecord> {
        let id = Uuid::new_v4().to_string();
        let key = record_key(collection, &id);
        let now = Utc::now();

        let mut session = self.adapter.write(&key).await?;
        session.load(None)?;
        let content = data
            .content
            .unwrap_or_else(|| ContentInput::Plain(String::new()));
        let state = stage_content(&mut session, content)?;
        let tree = session.tree()?;

        let stored = StoredRecord {
            id: id.clone(),
            created_at: now,
            updated_at: now,
            title: data.title,
            owner_id: data.owner_id,
            parent_id: data.parent_id,
            content: CrdtPayload::new(state.clone()),
            extra: data.extra,
        };
        self.backend
            .save(collection, &id, &stored.to_value()?)
            .await?;
        session.commit(state);

        log::debug!("Created document {}", key);
        Ok(stored.into_record(tree))
    }

    /// Load one document. `None` if absent.
    pub async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>> {
        let key = record_key(collection, id);
        let session = self.adapter.read(&key).await;
        let Some(value) = self.backend.load(collection, id).await? else {
            return Ok(None);
        };
        let stored = StoredRecord::from_value(&key, value)?;
        let tree = session.materialize(&stored.content.state)?;
        Ok(Some(stored.into_record(tree)))
    }

    /// Documents matching `query`, oldest first.
    pub async fn find(&self, collection: &str, query: &Query) -> Result<Vec<DocumentRecord>> {
        if let Some(id) = query.id() {
            let found = self.find_by_id(collection, id).await?;
            return Ok(found
                .into_iter()
                .filter(|record| query.matches(&record_fields(record)))
                .collect());
        }

        let mut records = Vec::new();
        for id in self.backend.ids(collection).await? {
            let key = record_key(collection, &id);
            let session = self.adapter.read(&key).await;
            let Some(value) = self.backend.load(collection, &id).await? else {
                continue;
            };
            if !query.matches(&value) {
                continue;
            }
            let stored = StoredRecord::from_value(&key, value)?;
            let tree = session.materialize(&stored.content.state)?;
            records.push(stored.into_record(tree));
        }
        records.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(records)
    }

    /// Apply `patch` to a document. `None` if absent.
    ///
    /// New content replaces the old one as CRDT operations against the stored
    /// state; other fields are overwritten.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        mut patch: DocumentPatch,
    ) -> Result<Option<DocumentRecord>> {
        let key = record_key(collection, id);
        let mut session = self.adapter.write(&key).await?;
        let Some(value) = self.backend.load(collection, id).await? else {
            return Ok(None);
        };
        let mut stored = StoredRecord::from_value(&key, value)?;
        session.load(Some(&stored.content.state))?;

        let state = match patch.content.take() {
            Some(content) => Some(stage_content(&mut session, content)?),
            None => None,
        };
        let tree = session.tree()?;

        patch.apply_fields(&mut stored);
        if let Some(state) = &state {
            stored.content = CrdtPayload::new(state.clone());
        }
        stored.updated_at = Utc::now();

        self.backend
            .save(collection, id, &stored.to_value()?)
            .await?;
        if let Some(state) = state {
            session.commit(state);
        }

        log::debug!("Updated document {}", key);
        Ok(Some(stored.into_record(tree)))
    }

    /// Merge state produced by another replica of a document. `None` if absent.
    pub async fn merge_remote(
        &self,
        collection: &str,
        id: &str,
        remote_state: &[u8],
    ) -> Result<Option<DocumentRecord>> {
        let key = record_key(collection, id);
        let mut session = self.adapter.write(&key).await?;
        let Some(value) = self.backend.load(collection, id).await? else {
            return Ok(None);
        };
        let mut stored = StoredRecord::from_value(&key, value)?;
        session.load(Some(&stored.content.state))?;

        let state = session
            .stage_merge(remote_state)
            .map_err(|e| invalid_remote_state(&key, e))?;
        let tree = session.tree()?;
        stored.content = CrdtPayload::new(state.clone());
        stored.updated_at = Utc::now();

        self.backend
            .save(collection, id, &stored.to_value()?)
            .await?;
        session.commit(state);

        log::debug!("Merged remote state into {}", key);
        Ok(Some(stored.into_record(tree)))
    }

    /// Raw persisted state of a document. `None` if absent.
    pub async fn state_of(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let key = record_key(collection, id);
        let _session = self.adapter.read(&key).await;
        match self.backend.load(collection, id).await? {
            Some(value) => Ok(Some(StoredRecord::from_value(&key, value)?.content.state)),
            None => Ok(None),
        }
    }

    /// Remove every document matching `query`. Returns whether any was removed.
    pub async fn delete(&self, collection: &str, query: &Query) -> Result<bool> {
        let ids: Vec<String> = match query.id() {
            Some(id) => vec![id.to_string()],
            None => self
                .backend
                .list(collection)
                .await?
                .iter()
                .filter(|value| query.matches(value))
                .filter_map(|value| value.get("_id").and_then(|id| id.as_str()))
                .map(str::to_string)
                .collect(),
        };

        let mut removed = false;
        for id in ids {
            if query.id().is_some() {
                // Check the remaining conditions against the stored record.
                let matches = self
                    .backend
                    .load(collection, &id)
                    .await?
                    .is_some_and(|value| query.matches(&value));
                if !matches {
                    continue;
                }
            }
            removed |= self.delete_by_id(collection, &id).await?;
        }
        Ok(removed)
    }

    /// Remove one document and its live replica. Returns whether it existed.
    pub async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool> {
        let key = record_key(collection, id);
        let session = self.adapter.write(&key).await?;
        let removed = self.backend.remove(collection, id).await?;
        self.adapter.cache().remove(&key);
        drop(session);

        if removed {
            log::debug!("Deleted document {}", key);
        }
        Ok(removed)
    }
}

/// Stage caller-supplied content on the live replica.
fn stage_content(session: &mut WriteSession<'_>, content: ContentInput) -> Result<Vec<u8>> {
    match content {
        ContentInput::Plain(text) => session.stage_tree(&RichTextNode::from_plain_text(&text)),
        ContentInput::Tree(tree) => session.stage_tree(&tree),
        ContentInput::Wrapped(state) => {
            let key = session.key().to_string();
            session
                .stage_merge(&state)
                .map_err(|e| invalid_remote_state(&key, e))
        }
    }
}

/// Caller-supplied state that does not decode is bad input, not corruption.
fn invalid_remote_state(key: &str, err: FolioError) -> FolioError {
    match err {
        FolioError::StorageCorruption { reason, .. } => {
            FolioError::Validation(format!("invalid replicated state for {key}: {reason}"))
        }
        other => other,
    }
}

/// Queryable fields of a materialized record.
fn record_fields(record: &DocumentRecord) -> serde_json::Value {
    let mut value = serde_json::to_value(record).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        map.remove("content");
    }
    value
}
