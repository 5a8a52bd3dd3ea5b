#![doc = include_str!(concat!(env!("OUT_DIR"), "/crdt_README.md"))]

mod adapter;
mod cache;
mod replica;

pub use adapter::{CrdtAdapter, ReadSession, WriteSession};
pub use cache::{DEFAULT_CACHE_CAPACITY, ReplicaCache};
pub use replica::ContentReplica;

use crate::error::Result;
use crate::rich_text::{RichTextNode, normalize, validate_document};

/// Label used in errors raised by the cache-less helpers below.
const DETACHED_KEY: &str = "<detached>";

/// Validate and normalize `tree`, seed a fresh log with it and return its
/// serialized state.
pub fn create_from_tree(tree: &RichTextNode) -> Result<Vec<u8>> {
    validate_document(tree)?;
    let replica = ContentReplica::from_tree(&normalize(tree))?;
    Ok(replica.encode_state())
}

/// Load `existing`, replace its content with `new_tree` in one transaction
/// and return the new state.
pub fn apply_tree_changes(existing: &[u8], new_tree: &RichTextNode) -> Result<Vec<u8>> {
    validate_document(new_tree)?;
    let replica = ContentReplica::from_state(DETACHED_KEY, existing)?;
    replica.replace_tree(&normalize(new_tree))?;
    Ok(replica.encode_state())
}

/// Reconstruct the canonical tree held by `state`.
pub fn materialize(state: &[u8]) -> Result<RichTextNode> {
    ContentReplica::from_state(DETACHED_KEY, state)?.to_tree()
}

/// Combine two states of the same document. The result does not depend on
/// argument order.
pub fn merge_states(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    let replica = ContentReplica::from_state(DETACHED_KEY, a)?;
    replica.apply_state(DETACHED_KEY, b)?;
    Ok(replica.encode_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FolioError;
    use crate::rich_text::{Mark, PLACEHOLDER_TEXT, flatten};

    #[test]
    fn test_hello_world_round_trip() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![RichTextNode::text(
            "Hello, World!",
        )])]);
        let state = create_from_tree(&tree).unwrap();
        assert_eq!(materialize(&state).unwrap(), tree);
    }

    #[test]
    fn test_round_trip_equals_normalized_input() {
        let tree = RichTextNode::doc(vec![
            RichTextNode::paragraph(vec![]),
            RichTextNode::paragraph(vec![
                RichTextNode::marked_text("a", vec![Mark::new("italic"), Mark::new("bold")]),
                RichTextNode::marked_text("b", vec![Mark::new("bold"), Mark::new("italic")]),
                RichTextNode::text(""),
            ]),
        ]);
        let state = create_from_tree(&tree).unwrap();
        assert_eq!(materialize(&state).unwrap(), normalize(&tree));
    }

    #[test]
    fn test_empty_attrs_round_trip() {
        let tree: RichTextNode = serde_json::from_value(serde_json::json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "attrs": {}, "content": [{ "type": "text", "text": "x" }] }]
        }))
        .unwrap();
        let state = create_from_tree(&tree).unwrap();
        assert_eq!(materialize(&state).unwrap(), normalize(&tree));
    }

    #[test]
    fn test_empty_paragraph_materializes_with_placeholder() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![])]);
        let materialized = materialize(&create_from_tree(&tree).unwrap()).unwrap();
        let leaf = &materialized.child_nodes()[0].child_nodes()[0];
        assert_eq!(leaf.text.as_deref(), Some(PLACEHOLDER_TEXT));
    }

    #[test]
    fn test_apply_tree_changes_updates_content() {
        let base = create_from_tree(&RichTextNode::from_plain_text("Initial content")).unwrap();
        let next = apply_tree_changes(&base, &RichTextNode::from_plain_text("Updated content"))
            .unwrap();

        assert_ne!(base, next);
        assert_eq!(flatten(&materialize(&next).unwrap()), "Updated content");
    }

    #[test]
    fn test_merge_is_order_independent() {
        let base = create_from_tree(&RichTextNode::from_plain_text("Base")).unwrap();
        let a = apply_tree_changes(&base, &RichTextNode::from_plain_text("Left edit")).unwrap();
        let a = apply_tree_changes(&a, &RichTextNode::from_plain_text("Left again")).unwrap();
        let b = apply_tree_changes(&base, &RichTextNode::from_plain_text("Right edit")).unwrap();

        let ab = materialize(&merge_states(&a, &b).unwrap()).unwrap();
        let ba = materialize(&merge_states(&b, &a).unwrap()).unwrap();
        assert_eq!(ab, ba);

        let text = flatten(&ab);
        assert!(text.contains("Left again"));
        assert!(text.contains("Right edit"));
        assert!(!text.contains("Base"));
    }

    #[test]
    fn test_rejects_non_doc_root() {
        let err = create_from_tree(&RichTextNode::paragraph(vec![RichTextNode::text("x")]))
            .unwrap_err();
        assert!(matches!(err, FolioError::Validation(_)));
    }

    #[test]
    fn test_corrupt_state_never_yields_tree() {
        assert!(matches!(
            materialize(&[]),
            Err(FolioError::StorageCorruption { .. })
        ));
        assert!(matches!(
            materialize(&[0xFF, 0x01, 0x02]),
            Err(FolioError::StorageCorruption { .. })
        ));
    }
}
