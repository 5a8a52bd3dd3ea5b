//! Version history of documents.
//!
//! A [`VersionSnapshot`] is a frozen copy of a document's tree. Snapshots are
//! plain tree JSON stored through the store's [`RecordBackend`] in their own
//! collection; they never hold replicated state. Restoring a snapshot feeds
//! its tree back through [`DocumentStore::update`], so the restore is one more
//! CRDT update on the document's history rather than a reset.
//!
//! [`RecordBackend`]: crate::store::RecordBackend

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use crate::content::ContentInput;
use crate::diff::{DiffNode, compute_diff, tree_or_empty};
use crate::error::{FolioError, Result};
use crate::rich_text::{RichTextNode, normalize, validate_document, word_count};
use crate::store::{DocumentPatch, DocumentRecord, DocumentStore, record_key};

/// Default collection of document records.
pub const DOCUMENTS_COLLECTION: &str = "documents";

/// Default collection of version snapshots.
pub const VERSIONS_COLLECTION: &str = "versions";

/// An immutable snapshot of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct VersionSnapshot {
    /// Snapshot id (UUID v4)
    #[serde(rename = "_id")]
    pub id: String,

    /// Document the snapshot was taken of
    pub document_id: String,

    /// Frozen content tree
    pub content: RichTextNode,

    /// When the snapshot was taken
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    /// Display name
    pub name: String,

    /// True for snapshots taken automatically rather than on request
    pub auto_generated: bool,

    /// Words in `content` at snapshot time
    pub word_count: usize,
}

/// The parts of a stored snapshot a diff needs, read leniently.
struct ComparableSnapshot {
    document_id: Option<String>,
    content: RichTextNode,
}

/// Version snapshots of the documents of one store.
pub struct VersionLog<'a> {
    store: &'a DocumentStore,
    documents: String,
    versions: String,
}

impl<'a> VersionLog<'a> {
    /// Version log over `store` using the default collections.
    pub fn new(store: &'a DocumentStore) -> Self {
        Self::with_collections(store, DOCUMENTS_COLLECTION, VERSIONS_COLLECTION)
    }

    /// Version log over `store` with custom document and version collections.
    pub fn with_collections(
        store: &'a DocumentStore,
        documents: impl Into<String>,
        versions: impl Into<String>,
    ) -> Self {
        Self {
            store,
            documents: documents.into(),
            versions: versions.into(),
        }
    }

    /// Store a snapshot of `content` for `document_id`.
    ///
    /// `name` defaults to the creation timestamp.
    pub async fn create(
        &self,
        document_id: &str,
        content: &RichTextNode,
        name: Option<String>,
        auto_generated: bool,
    ) -> Result<VersionSnapshot> {
        validate_document(content)?;
        let content = normalize(content);
        let created_at = Utc::now();
        let snapshot = VersionSnapshot {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            word_count: word_count(&content),
            content,
            created_at,
            name: name.unwrap_or_else(|| created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            auto_generated,
        };

        let value = serde_json::to_value(&snapshot)?;
        self.store
            .backend()
            .save(&self.versions, &snapshot.id, &value)
            .await?;
        log::debug!(
            "Created version {} of document {}",
            snapshot.id,
            document_id
        );
        Ok(snapshot)
    }

    /// Snapshot the current content of a document. `None` if it does not
    /// exist.
    pub async fn snapshot_current(
        &self,
        document_id: &str,
        name: Option<String>,
        auto_generated: bool,
    ) -> Result<Option<VersionSnapshot>> {
        let Some(record) = self.store.find_by_id(&self.documents, document_id).await? else {
            return Ok(None);
        };
        self.create(document_id, &record.content, name, auto_generated)
            .await
            .map(Some)
    }

    /// One snapshot. `None` if absent.
    pub async fn get(&self, version_id: &str) -> Result<Option<VersionSnapshot>> {
        match self.store.backend().load(&self.versions, version_id).await? {
            Some(value) => self.parse(version_id, value).map(Some),
            None => Ok(None),
        }
    }

    /// Snapshots of a document, oldest first.
    pub async fn list_by_document(&self, document_id: &str) -> Result<Vec<VersionSnapshot>> {
        let mut snapshots = Vec::new();
        for value in self.store.backend().list(&self.versions).await? {
            if value.get("documentId").and_then(Value::as_str) != Some(document_id) {
                continue;
            }
            let id = value
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match self.parse(&id, value) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => log::warn!("Skipping unreadable version: {}", e),
            }
        }
        snapshots.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(snapshots)
    }

    /// Bring a document back to a snapshot's content.
    ///
    /// `None` if the document or the snapshot does not exist, or the snapshot
    /// belongs to another document.
    pub async fn restore(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<Option<DocumentRecord>> {
        let Some(snapshot) = self.get(version_id).await? else {
            return Ok(None);
        };
        if snapshot.document_id != document_id {
            log::warn!(
                "Version {} belongs to document {}, not {}",
                version_id,
                snapshot.document_id,
                document_id
            );
            return Ok(None);
        }

        let restored = self
            .store
            .update(
                &self.documents,
                document_id,
                DocumentPatch::content(ContentInput::Tree(snapshot.content)),
            )
            .await?;
        if restored.is_some() {
            log::debug!("Restored document {} to version {}", document_id, version_id);
        }
        Ok(restored)
    }

    /// Remove one snapshot. Returns whether it existed.
    pub async fn delete(&self, version_id: &str) -> Result<bool> {
        self.store.backend().remove(&self.versions, version_id).await
    }

    /// Remove every snapshot of a document. Returns how many were removed.
    ///
    /// Snapshots whose content no longer parses are removed too.
    pub async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let mut removed = 0;
        for value in self.store.backend().list(&self.versions).await? {
            if value.get("documentId").and_then(Value::as_str) != Some(document_id) {
                continue;
            }
            let Some(id) = value.get("_id").and_then(Value::as_str) else {
                continue;
            };
            if self.delete(id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Diff a snapshot against the document's current content. `None` if
    /// either is missing or the snapshot belongs to another document.
    ///
    /// Snapshot content that no longer parses compares as an empty document.
    pub async fn diff_with_current(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<Option<DiffNode>> {
        let Some(snapshot) = self.comparable(version_id).await? else {
            return Ok(None);
        };
        if snapshot.document_id.as_deref() != Some(document_id) {
            log::warn!(
                "Version {} does not belong to document {}",
                version_id,
                document_id
            );
            return Ok(None);
        }
        let Some(current) = self.store.find_by_id(&self.documents, document_id).await? else {
            return Ok(None);
        };
        Ok(Some(compute_diff(&snapshot.content, &current.content)))
    }

    /// Diff two snapshots, `from` being the older side. `None` if either is
    /// missing.
    ///
    /// Snapshot content that no longer parses compares as an empty document.
    pub async fn diff_versions(&self, from_id: &str, to_id: &str) -> Result<Option<DiffNode>> {
        let (Some(from), Some(to)) = (self.comparable(from_id).await?, self.comparable(to_id).await?)
        else {
            return Ok(None);
        };
        Ok(Some(compute_diff(&from.content, &to.content)))
    }

    async fn comparable(&self, version_id: &str) -> Result<Option<ComparableSnapshot>> {
        let Some(value) = self.store.backend().load(&self.versions, version_id).await? else {
            return Ok(None);
        };
        let document_id = value
            .get("documentId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let content = tree_or_empty(value.get("content").unwrap_or(&Value::Null));
        Ok(Some(ComparableSnapshot {
            document_id,
            content,
        }))
    }

    fn parse(&self, version_id: &str, value: Value) -> Result<VersionSnapshot> {
        serde_json::from_value(value)
            .map_err(|e| FolioError::corruption(record_key(&self.versions, version_id), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffType;
    use crate::fs::block_on_test;
    use crate::store::{MemoryBackend, NewDocument};
    use std::sync::Arc;

    fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(MemoryBackend::new()))
    }

    fn create_doc(store: &DocumentStore, text: &str) -> DocumentRecord {
        block_on_test(store.create(DOCUMENTS_COLLECTION, NewDocument::new("Draft", text))).unwrap()
    }

    #[test]
    fn test_create_defaults_name_to_timestamp() {
        let store = store();
        let log = VersionLog::new(&store);
        let content = RichTextNode::from_plain_text("Three little words");

        let snapshot = block_on_test(log.create("doc-1", &content, None, false)).unwrap();
        assert_eq!(snapshot.word_count, 3);
        assert!(!snapshot.auto_generated);
        assert_eq!(
            snapshot.name,
            snapshot.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let loaded = block_on_test(log.get(&snapshot.id)).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_create_normalizes_and_rejects_invalid() {
        let store = store();
        let log = VersionLog::new(&store);

        let empty_paragraph = RichTextNode::doc(vec![RichTextNode::paragraph(vec![])]);
        let snapshot =
            block_on_test(log.create("doc-1", &empty_paragraph, Some("Empty".into()), true))
                .unwrap();
        assert_eq!(snapshot.content, RichTextNode::from_plain_text(""));
        assert_eq!(snapshot.name, "Empty");

        let not_a_doc = RichTextNode::paragraph(vec![RichTextNode::text("x")]);
        let err = block_on_test(log.create("doc-1", &not_a_doc, None, false)).unwrap_err();
        assert!(matches!(err, FolioError::Validation(_)));
    }

    #[test]
    fn test_list_by_document_is_chronological() {
        let store = store();
        let log = VersionLog::new(&store);
        let tree = RichTextNode::from_plain_text("x");

        let first = block_on_test(log.create("doc-1", &tree, Some("one".into()), false)).unwrap();
        block_on_test(log.create("doc-2", &tree, Some("other".into()), false)).unwrap();
        let second = block_on_test(log.create("doc-1", &tree, Some("two".into()), false)).unwrap();

        let listed = block_on_test(log.list_by_document("doc-1")).unwrap();
        let mut expected = vec![first, second];
        expected.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_snapshot_current_and_restore() {
        let store = store();
        let log = VersionLog::new(&store);
        let doc = create_doc(&store, "Version one");

        let v1 = block_on_test(log.snapshot_current(&doc.id, None, false))
            .unwrap()
            .unwrap();
        block_on_test(store.update(
            DOCUMENTS_COLLECTION,
            &doc.id,
            DocumentPatch::content("Version two"),
        ))
        .unwrap();

        let restored = block_on_test(log.restore(&doc.id, &v1.id))
            .unwrap()
            .unwrap();
        assert_eq!(restored.plain_text(), "Version one");
        let found = block_on_test(store.find_by_id(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();
        assert_eq!(found.content, v1.content);
    }

    #[test]
    fn test_restore_builds_on_document_history() {
        let store = store();
        let log = VersionLog::new(&store);
        let doc = create_doc(&store, "Original");
        let v1 = block_on_test(log.snapshot_current(&doc.id, None, false))
            .unwrap()
            .unwrap();
        block_on_test(store.update(
            DOCUMENTS_COLLECTION,
            &doc.id,
            DocumentPatch::content("Rewritten"),
        ))
        .unwrap();
        let before_restore = block_on_test(store.state_of(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();

        block_on_test(log.restore(&doc.id, &v1.id)).unwrap().unwrap();

        // The pre-restore state is already part of the history, so merging it
        // again must not bring "Rewritten" back.
        let merged = block_on_test(store.merge_remote(
            DOCUMENTS_COLLECTION,
            &doc.id,
            &before_restore,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(merged.plain_text(), "Original");
    }

    #[test]
    fn test_restore_missing_or_foreign_version() {
        let store = store();
        let log = VersionLog::new(&store);
        let a = create_doc(&store, "A");
        let b = create_doc(&store, "B");
        let version_of_b = block_on_test(log.snapshot_current(&b.id, None, false))
            .unwrap()
            .unwrap();

        assert!(block_on_test(log.restore(&a.id, "missing")).unwrap().is_none());
        assert!(
            block_on_test(log.restore(&a.id, &version_of_b.id))
                .unwrap()
                .is_none()
        );
        assert!(
            block_on_test(log.snapshot_current("missing", None, false))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_diffs_against_history() {
        let store = store();
        let log = VersionLog::new(&store);
        let doc = create_doc(&store, "First paragraph");
        let v1 = block_on_test(log.snapshot_current(&doc.id, None, false))
            .unwrap()
            .unwrap();
        block_on_test(store.update(
            DOCUMENTS_COLLECTION,
            &doc.id,
            DocumentPatch::content("First paragraph\n\nSecond paragraph"),
        ))
        .unwrap();
        let v2 = block_on_test(log.snapshot_current(&doc.id, None, true))
            .unwrap()
            .unwrap();

        let against_current = block_on_test(log.diff_with_current(&doc.id, &v1.id))
            .unwrap()
            .unwrap();
        assert_eq!(against_current.spans(DiffType::Added), vec!["Second paragraph"]);

        let between = block_on_test(log.diff_versions(&v2.id, &v1.id))
            .unwrap()
            .unwrap();
        assert_eq!(between.spans(DiffType::Removed), vec!["Second paragraph"]);

        assert!(
            block_on_test(log.diff_versions(&v1.id, "missing"))
                .unwrap()
                .is_none()
        );
    }

    fn save_raw_version(store: &DocumentStore, id: &str, value: Value) {
        block_on_test(store.backend().save(VERSIONS_COLLECTION, id, &value)).unwrap();
    }

    #[test]
    fn test_unreadable_snapshot_diffs_as_empty() {
        let store = store();
        let log = VersionLog::new(&store);
        let doc = create_doc(&store, "Current text");
        let good = block_on_test(log.snapshot_current(&doc.id, None, false))
            .unwrap()
            .unwrap();
        save_raw_version(
            &store,
            "bad",
            serde_json::json!({ "_id": "bad", "documentId": &doc.id, "content": "garbage" }),
        );

        let between = block_on_test(log.diff_versions("bad", &good.id))
            .unwrap()
            .unwrap();
        assert_eq!(between.spans(DiffType::Added), vec!["Current text"]);
        assert!(between.spans(DiffType::Removed).is_empty());

        let against_current = block_on_test(log.diff_with_current(&doc.id, "bad"))
            .unwrap()
            .unwrap();
        assert_eq!(against_current.spans(DiffType::Added), vec!["Current text"]);

        assert!(matches!(
            block_on_test(log.get("bad")),
            Err(FolioError::StorageCorruption { .. })
        ));
    }

    #[test]
    fn test_list_skips_unreadable_snapshot() {
        let store = store();
        let log = VersionLog::new(&store);
        let doc = create_doc(&store, "Text");
        let good = block_on_test(log.snapshot_current(&doc.id, None, false))
            .unwrap()
            .unwrap();
        save_raw_version(
            &store,
            "bad",
            serde_json::json!({ "_id": "bad", "documentId": &doc.id, "content": "garbage" }),
        );

        let listed = block_on_test(log.list_by_document(&doc.id)).unwrap();
        assert_eq!(listed, vec![good]);

        assert_eq!(block_on_test(log.delete_by_document(&doc.id)).unwrap(), 2);
        assert!(block_on_test(log.get("bad")).unwrap().is_none());
    }

    #[test]
    fn test_diff_with_current_rejects_foreign_version() {
        let store = store();
        let log = VersionLog::new(&store);
        let a = create_doc(&store, "A");
        let b = create_doc(&store, "B");
        let version_of_b = block_on_test(log.snapshot_current(&b.id, None, false))
            .unwrap()
            .unwrap();

        assert!(
            block_on_test(log.diff_with_current(&a.id, &version_of_b.id))
                .unwrap()
                .is_none()
        );
        assert!(
            block_on_test(log.diff_with_current(&b.id, &version_of_b.id))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_delete_and_delete_by_document() {
        let store = store();
        let log = VersionLog::new(&store);
        let tree = RichTextNode::from_plain_text("x");
        let a = block_on_test(log.create("doc-1", &tree, None, false)).unwrap();
        block_on_test(log.create("doc-1", &tree, None, false)).unwrap();
        block_on_test(log.create("doc-2", &tree, None, false)).unwrap();

        assert!(block_on_test(log.delete(&a.id)).unwrap());
        assert!(!block_on_test(log.delete(&a.id)).unwrap());
        assert_eq!(block_on_test(log.delete_by_document("doc-1")).unwrap(), 1);
        assert!(block_on_test(log.list_by_document("doc-1")).unwrap().is_empty());
        assert_eq!(block_on_test(log.list_by_document("doc-2")).unwrap().len(), 1);
    }
}
