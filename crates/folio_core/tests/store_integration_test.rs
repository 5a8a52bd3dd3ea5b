//! Integration tests for the document store, CRDT adapter, diff engine and
//! version log, through the public API only.

#[cfg(test)]
mod store_integration_tests {
    use std::sync::Arc;

    use folio_core::content::ContentInput;
    use folio_core::crdt::{apply_tree_changes, create_from_tree, materialize, merge_states};
    use folio_core::diff::{DiffSummary, DiffType, compute_diff};
    use folio_core::fs::{RealFileSystem, SyncToAsyncFs};
    use folio_core::rich_text::{Mark, RichTextNode, flatten, normalize};
    use folio_core::store::{
        DocumentPatch, DocumentStore, FileBackend, MemoryBackend, NewDocument, Query,
    };
    use folio_core::version::{DOCUMENTS_COLLECTION, VersionLog};
    use futures_lite::future::block_on;
    use serde_json::json;

    fn memory_store() -> DocumentStore {
        DocumentStore::new(Arc::new(MemoryBackend::new()))
    }

    fn rich_tree() -> RichTextNode {
        RichTextNode::doc(vec![
            RichTextNode::heading(2, vec![RichTextNode::text("Chapter One")]),
            RichTextNode::paragraph(vec![
                RichTextNode::text("It was a "),
                RichTextNode::marked_text(
                    "dark",
                    vec![Mark::new("bold"), Mark::new("italic")],
                ),
                RichTextNode::text(" and "),
                RichTextNode::marked_text(
                    "stormy",
                    vec![Mark::with_attr("link", "href", json!("https://example.com"))],
                ),
                RichTextNode::hard_break(),
                RichTextNode::text("night."),
            ]),
            RichTextNode::paragraph(vec![]),
        ])
    }

    #[test]
    fn test_tree_survives_replication() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![RichTextNode::text(
            "Hello, World!",
        )])]);
        let state = create_from_tree(&tree).unwrap();
        assert_eq!(materialize(&state).unwrap(), tree);
    }

    #[test]
    fn test_rich_tree_round_trips_normalized() {
        let tree = rich_tree();
        let state = create_from_tree(&tree).unwrap();
        assert_eq!(materialize(&state).unwrap(), normalize(&tree));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&rich_tree());
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_empty_paragraph_gets_placeholder() {
        let tree: RichTextNode = serde_json::from_value(json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "content": [] }]
        }))
        .unwrap();
        let normalized = normalize(&tree);
        assert_eq!(
            normalized,
            RichTextNode::doc(vec![RichTextNode::paragraph(vec![RichTextNode::text(" ")])])
        );
    }

    #[test]
    fn test_divergent_edits_converge() {
        let base = create_from_tree(&RichTextNode::from_plain_text("Shared start")).unwrap();
        let left = apply_tree_changes(&base, &RichTextNode::from_plain_text("Left edit")).unwrap();
        let right =
            apply_tree_changes(&base, &RichTextNode::from_plain_text("Right edit")).unwrap();

        let left_then_right = materialize(&merge_states(&left, &right).unwrap()).unwrap();
        let right_then_left = materialize(&merge_states(&right, &left).unwrap()).unwrap();
        assert_eq!(left_then_right, right_then_left);

        let text = flatten(&left_then_right);
        assert!(text.contains("Left edit"));
        assert!(text.contains("Right edit"));
    }

    #[test]
    fn test_update_replaces_content_and_state() {
        let store = memory_store();
        let doc = block_on(store.create(
            DOCUMENTS_COLLECTION,
            NewDocument::new("Notes", "Initial content"),
        ))
        .unwrap();
        let before = block_on(store.state_of(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();

        block_on(store.update(
            DOCUMENTS_COLLECTION,
            &doc.id,
            DocumentPatch::content("Updated content"),
        ))
        .unwrap()
        .unwrap();

        let found = block_on(store.find_by_id(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();
        assert_eq!(found.plain_text(), "Updated content");
        let after = block_on(store.state_of(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_content_accepted_as_json_forms() {
        let store = memory_store();
        let tree_json = json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": "From JSON" }] }]
        });
        let data = NewDocument::from_json(&json!({ "title": "T", "content": tree_json })).unwrap();
        let doc = block_on(store.create(DOCUMENTS_COLLECTION, data)).unwrap();
        assert_eq!(doc.plain_text(), "From JSON");

        let state = block_on(store.state_of(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();
        let wrapped = ContentInput::from_json(&json!({ "type": "crdt", "state": state })).unwrap();
        let copy = block_on(store.create(
            DOCUMENTS_COLLECTION,
            NewDocument::new("Copy", wrapped),
        ))
        .unwrap();
        assert_eq!(copy.content, doc.content);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            DocumentStore::new(Arc::new(FileBackend::new(
                SyncToAsyncFs::new(RealFileSystem),
                dir.path(),
            )))
        };

        let doc = {
            let store = open();
            let doc = block_on(store.create(
                DOCUMENTS_COLLECTION,
                NewDocument::new("Persisted", rich_tree()).owned_by("u1"),
            ))
            .unwrap();
            block_on(store.update(
                DOCUMENTS_COLLECTION,
                &doc.id,
                DocumentPatch::title("Renamed"),
            ))
            .unwrap();
            doc
        };

        let store = open();
        let found = block_on(store.find_by_id(DOCUMENTS_COLLECTION, &doc.id))
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Renamed");
        assert_eq!(found.content, normalize(&rich_tree()));

        let listed = block_on(store.find(
            DOCUMENTS_COLLECTION,
            &Query::all().where_eq("ownerId", "u1"),
        ))
        .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_diff_of_identical_trees_is_unchanged() {
        let tree = rich_tree();
        let diff = compute_diff(&tree, &tree);
        assert!(
            diff.leaves()
                .iter()
                .all(|leaf| leaf.diff_type == Some(DiffType::None))
        );
        assert!(!DiffSummary::of(&diff).has_changes());
    }

    #[test]
    fn test_diff_marks_added_paragraph() {
        let old = RichTextNode::doc(vec![RichTextNode::paragraph(vec![RichTextNode::text(
            "First paragraph",
        )])]);
        let new = RichTextNode::doc(vec![
            RichTextNode::paragraph(vec![RichTextNode::text("First paragraph")]),
            RichTextNode::paragraph(vec![RichTextNode::text("Second paragraph")]),
        ]);

        let diff = compute_diff(&old, &new);
        let paragraphs = diff.child_nodes();
        assert_eq!(paragraphs.len(), 2);
        assert!(
            paragraphs[0]
                .child_nodes()
                .iter()
                .all(|leaf| leaf.diff_type == Some(DiffType::None))
        );
        assert!(
            paragraphs[1]
                .child_nodes()
                .iter()
                .all(|leaf| leaf.diff_type == Some(DiffType::Added))
        );
    }

    #[test]
    fn test_version_history_flow() {
        let store = memory_store();
        let versions = VersionLog::new(&store);
        let doc = block_on(store.create(
            DOCUMENTS_COLLECTION,
            NewDocument::new("Essay", "Draft one"),
        ))
        .unwrap();

        let v1 = block_on(versions.snapshot_current(&doc.id, Some("first".into()), false))
            .unwrap()
            .unwrap();
        block_on(store.update(
            DOCUMENTS_COLLECTION,
            &doc.id,
            DocumentPatch::content("Draft two"),
        ))
        .unwrap();
        block_on(versions.snapshot_current(&doc.id, None, true)).unwrap();

        let listed = block_on(versions.list_by_document(&doc.id)).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|v| v.id == v1.id && v.name == "first"));

        let diff = block_on(versions.diff_with_current(&doc.id, &v1.id))
            .unwrap()
            .unwrap();
        assert_eq!(diff.spans(DiffType::Removed), vec!["one"]);
        assert_eq!(diff.spans(DiffType::Added), vec!["two"]);

        let restored = block_on(versions.restore(&doc.id, &v1.id))
            .unwrap()
            .unwrap();
        assert_eq!(restored.plain_text(), "Draft one");
    }
}
