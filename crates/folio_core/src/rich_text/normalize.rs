//! Validation and normalization of rich-text trees.
//!
//! The replicated log cannot tell an absent text leaf from a leaf of length
//! zero, so every tree crossing the replication boundary is normalized first:
//! empty paragraph-like nodes get a single placeholder leaf, zero-length leaves
//! disappear and marks are put in canonical order.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{DOC, Mark, PARAGRAPH, PLACEHOLDER_TEXT, RichTextNode};
use crate::error::{FolioError, Result};

/// Check that `tree` is a structurally valid node, ignoring the problems that
/// [`normalize`] repairs.
pub fn validate(tree: &RichTextNode) -> Result<()> {
    validate_node(tree, "$")
}

/// [`validate`], additionally requiring a `doc` root.
pub fn validate_document(tree: &RichTextNode) -> Result<()> {
    if tree.node_type != DOC {
        return Err(FolioError::Validation(format!(
            "document root must be a '{}' node, found '{}'",
            DOC, tree.node_type
        )));
    }
    validate(tree)
}

fn validate_node(node: &RichTextNode, path: &str) -> Result<()> {
    if node.node_type.is_empty() {
        return Err(FolioError::Validation(format!("{path}: node type is empty")));
    }

    if node.is_text() {
        if node.text.is_none() {
            return Err(FolioError::Validation(format!(
                "{path}: text node has no text"
            )));
        }
        if !node.child_nodes().is_empty() {
            return Err(FolioError::Validation(format!(
                "{path}: text node has children"
            )));
        }
        return Ok(());
    }

    if node.text.is_some() {
        return Err(FolioError::Validation(format!(
            "{path}: '{}' node carries text",
            node.node_type
        )));
    }
    if node.marks.as_ref().is_some_and(|m| !m.is_empty()) {
        return Err(FolioError::Validation(format!(
            "{path}: marks are only allowed on text nodes, found on '{}'",
            node.node_type
        )));
    }

    if node.is_leaf() {
        if !node.child_nodes().is_empty() {
            return Err(FolioError::Validation(format!(
                "{path}: '{}' node cannot have children",
                node.node_type
            )));
        }
        return Ok(());
    }

    let children = node.child_nodes();
    if children.is_empty() && !is_repairable_when_empty(node) {
        return Err(FolioError::Validation(format!(
            "{path}: '{}' node has no children",
            node.node_type
        )));
    }

    for (i, child) in children.iter().enumerate() {
        validate_node(child, &format!("{path}.{}[{i}]", node.node_type))?;
    }
    Ok(())
}

fn is_repairable_when_empty(node: &RichTextNode) -> bool {
    node.is_textblock() || node.node_type == DOC
}

/// Rewrite `tree` into canonical form.
///
/// - empty paragraph-like nodes hold exactly one `" "` text leaf
/// - an empty `doc` holds one such placeholder paragraph
/// - zero-length text leaves are removed
/// - adjacent text leaves with the same marks are merged
/// - marks are deduplicated by type and sorted
/// - empty `attrs` objects on nodes and marks are dropped
///
/// Normalizing a normalized tree returns it unchanged.
pub fn normalize(tree: &RichTextNode) -> RichTextNode {
    if tree.is_text() {
        return RichTextNode {
            node_type: tree.node_type.clone(),
            attrs: None,
            children: None,
            text: Some(tree.text.clone().unwrap_or_default()),
            marks: canonical_marks(tree.marks.as_deref()),
        };
    }

    if tree.is_leaf() {
        return RichTextNode {
            node_type: tree.node_type.clone(),
            attrs: canonical_attrs(tree.attrs.as_ref()),
            children: None,
            text: None,
            marks: None,
        };
    }

    let mut children: Vec<RichTextNode> = Vec::with_capacity(tree.child_nodes().len());
    for child in tree.child_nodes() {
        let child = normalize(child);
        if child.is_text() && child.text.as_deref().is_some_and(str::is_empty) {
            continue;
        }
        match children.last_mut() {
            Some(prev) if prev.is_text() && child.is_text() && prev.marks == child.marks => {
                if let (Some(prev_text), Some(text)) = (prev.text.as_mut(), child.text.as_deref()) {
                    prev_text.push_str(text);
                }
            }
            _ => children.push(child),
        }
    }

    if children.is_empty() {
        if tree.is_textblock() {
            children.push(RichTextNode::text(PLACEHOLDER_TEXT));
        } else if tree.node_type == DOC {
            children.push(RichTextNode::element(
                PARAGRAPH,
                vec![RichTextNode::text(PLACEHOLDER_TEXT)],
            ));
        }
    }

    RichTextNode {
        node_type: tree.node_type.clone(),
        attrs: canonical_attrs(tree.attrs.as_ref()),
        children: Some(children),
        text: None,
        marks: None,
    }
}

/// Deduplicate by type (last occurrence wins) and sort by type.
fn canonical_marks(marks: Option<&[Mark]>) -> Option<Vec<Mark>> {
    let marks = marks?;
    let mut canonical: Vec<Mark> = Vec::with_capacity(marks.len());
    for mark in marks {
        let mark = Mark {
            mark_type: mark.mark_type.clone(),
            attrs: canonical_attrs(mark.attrs.as_ref()),
        };
        match canonical.iter_mut().find(|m| m.mark_type == mark.mark_type) {
            Some(existing) => *existing = mark,
            None => canonical.push(mark),
        }
    }
    canonical.sort_by(|a, b| a.mark_type.cmp(&b.mark_type));
    if canonical.is_empty() {
        None
    } else {
        Some(canonical)
    }
}

fn canonical_attrs(attrs: Option<&BTreeMap<String, Value>>) -> Option<BTreeMap<String, Value>> {
    attrs.filter(|map| !map.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rich_text::{HARD_BREAK, Mark};

    fn placeholder_paragraph() -> RichTextNode {
        RichTextNode::paragraph(vec![RichTextNode::text(PLACEHOLDER_TEXT)])
    }

    #[test]
    fn test_empty_children_paragraph_gets_placeholder() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![])]);
        assert_eq!(normalize(&tree), RichTextNode::doc(vec![placeholder_paragraph()]));
    }

    #[test]
    fn test_paragraph_without_children_field_gets_placeholder() {
        let tree = RichTextNode::doc(vec![RichTextNode::new(PARAGRAPH)]);
        assert_eq!(normalize(&tree), RichTextNode::doc(vec![placeholder_paragraph()]));
    }

    #[test]
    fn test_zero_length_leaf_removed() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![
            RichTextNode::text(""),
            RichTextNode::text("kept"),
        ])]);
        let normalized = normalize(&tree);
        assert_eq!(
            normalized.child_nodes()[0].child_nodes(),
            &[RichTextNode::text("kept")]
        );
    }

    #[test]
    fn test_only_zero_length_leaf_becomes_placeholder() {
        let tree = RichTextNode::doc(vec![RichTextNode::paragraph(vec![RichTextNode::text("")])]);
        assert_eq!(normalize(&tree), RichTextNode::doc(vec![placeholder_paragraph()]));
    }

    #[test]
    fn test_empty_doc_gets_placeholder_paragraph() {
        assert_eq!(
            normalize(&RichTextNode::doc(vec![])),
            RichTextNode::doc(vec![placeholder_paragraph()])
        );
    }

    #[test]
    fn test_adjacent_leaves_with_same_marks_merge() {
        let bold = || vec![Mark::new("bold")];
        let tree = RichTextNode::paragraph(vec![
            RichTextNode::marked_text("Hel", bold()),
            RichTextNode::marked_text("lo", bold()),
            RichTextNode::text(" world"),
        ]);
        let normalized = normalize(&tree);
        assert_eq!(
            normalized.child_nodes(),
            &[
                RichTextNode::marked_text("Hello", bold()),
                RichTextNode::text(" world"),
            ]
        );
    }

    #[test]
    fn test_marks_sorted_and_deduplicated() {
        let leaf = RichTextNode::marked_text(
            "x",
            vec![
                Mark::new("italic"),
                Mark::with_attr("link", "href", "a".into()),
                Mark::new("bold"),
                Mark::with_attr("link", "href", "b".into()),
            ],
        );
        let normalized = normalize(&leaf);
        assert_eq!(normalized.mark_types(), vec!["bold", "italic", "link"]);
        let marks = normalized.marks.unwrap();
        assert_eq!(marks[2].attrs.as_ref().unwrap()["href"], "b");
    }

    #[test]
    fn test_empty_marks_become_absent() {
        let leaf = RichTextNode::marked_text("x", vec![]);
        assert_eq!(normalize(&leaf), RichTextNode::text("x"));
    }

    #[test]
    fn test_empty_attrs_become_absent() {
        let tree: RichTextNode = serde_json::from_value(serde_json::json!({
            "type": "doc",
            "attrs": {},
            "content": [
                {
                    "type": "paragraph",
                    "attrs": {},
                    "content": [{ "type": "text", "text": "x", "marks": [{ "type": "bold", "attrs": {} }] }]
                },
                { "type": "image", "attrs": {} }
            ]
        }))
        .unwrap();

        let normalized = normalize(&tree);
        assert_eq!(normalized.attrs, None);
        let paragraph = &normalized.child_nodes()[0];
        assert_eq!(paragraph.attrs, None);
        assert_eq!(paragraph.child_nodes()[0].marks, Some(vec![Mark::new("bold")]));
        assert_eq!(normalized.child_nodes()[1].attrs, None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let trees = vec![
            RichTextNode::doc(vec![]),
            RichTextNode::doc(vec![
                RichTextNode::paragraph(vec![]),
                RichTextNode::heading(1, vec![RichTextNode::text("")]),
                RichTextNode::paragraph(vec![
                    RichTextNode::marked_text("a", vec![Mark::new("em"), Mark::new("bold")]),
                    RichTextNode::marked_text("b", vec![Mark::new("bold"), Mark::new("em")]),
                    RichTextNode::hard_break(),
                    RichTextNode::text(""),
                ]),
                RichTextNode::element(
                    "bulletList",
                    vec![RichTextNode::element(
                        "listItem",
                        vec![RichTextNode::paragraph(vec![])],
                    )],
                ),
            ]),
        ];

        for tree in trees {
            let once = normalize(&tree);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_validate_accepts_repairable_trees() {
        let tree = RichTextNode::doc(vec![
            RichTextNode::paragraph(vec![]),
            RichTextNode::paragraph(vec![RichTextNode::text("a"), RichTextNode::hard_break()]),
        ]);
        assert!(validate_document(&tree).is_ok());
        assert!(validate_document(&RichTextNode::doc(vec![])).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_container() {
        let tree = RichTextNode::doc(vec![RichTextNode::element("bulletList", vec![])]);
        assert!(matches!(validate(&tree), Err(FolioError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_text_without_text() {
        let tree = RichTextNode::paragraph(vec![RichTextNode::new("text")]);
        assert!(matches!(validate(&tree), Err(FolioError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_marks_on_block() {
        let mut para = RichTextNode::paragraph(vec![RichTextNode::text("a")]);
        para.marks = Some(vec![Mark::new("bold")]);
        assert!(matches!(validate(&para), Err(FolioError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_atom_with_children() {
        let node = RichTextNode::element(HARD_BREAK, vec![RichTextNode::text("a")]);
        assert!(matches!(validate(&node), Err(FolioError::Validation(_))));
    }

    #[test]
    fn test_validate_document_requires_doc_root() {
        let err = validate_document(&RichTextNode::paragraph(vec![RichTextNode::text("a")]))
            .unwrap_err();
        assert!(err.to_string().contains("doc"));
    }
}
