//! Structural diff between two document trees.
//!
//! Both trees are flattened to plain text, diffed character by character and
//! cleaned up to word boundaries, then cut back into paragraphs on the block
//! separator. Every text leaf of the result carries a [`DiffType`].
//!
//! ```ignore
//! use folio_core::diff::compute_diff;
//! use folio_core::rich_text::RichTextNode;
//!
//! let old = RichTextNode::from_plain_text("First paragraph");
//! let new = RichTextNode::from_plain_text("First paragraph\n\nSecond paragraph");
//! let diff = compute_diff(&old, &new);
//! assert_eq!(diff.child_nodes().len(), 2);
//! ```
//!
//! The diff never fails and never touches replicated state, so it can compare
//! two snapshots as well as a snapshot against live content.

mod text;

pub use text::{Edit, EditOp, diff_text};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::rich_text::{BLOCK_SEPARATOR, DOC, PARAGRAPH, PLACEHOLDER_TEXT, RichTextNode, TEXT, flatten};

/// Change status of a diff leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum DiffType {
    /// Present in both versions
    None,
    /// Only in the new version
    Added,
    /// Only in the old version
    Removed,
}

/// A node of a diff tree. Shaped like [`RichTextNode`]; text leaves carry a
/// `diffType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DiffNode {
    /// Node type tag ("doc", "paragraph" or "text")
    #[serde(rename = "type")]
    pub node_type: String,

    /// Ordered child nodes (absent on leaves)
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DiffNode>>,

    /// Text of a leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Change status of a leaf
    #[serde(rename = "diffType", default, skip_serializing_if = "Option::is_none")]
    pub diff_type: Option<DiffType>,
}

impl DiffNode {
    fn container(node_type: &str, children: Vec<DiffNode>) -> Self {
        Self {
            node_type: node_type.to_string(),
            children: Some(children),
            text: None,
            diff_type: None,
        }
    }

    fn leaf(text: impl Into<String>, diff_type: DiffType) -> Self {
        Self {
            node_type: TEXT.to_string(),
            children: None,
            text: Some(text.into()),
            diff_type: Some(diff_type),
        }
    }

    /// Children as a slice (empty for leaves).
    pub fn child_nodes(&self) -> &[DiffNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// All text leaves in document order.
    pub fn leaves(&self) -> Vec<&DiffNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a DiffNode>) {
        if self.text.is_some() {
            out.push(self);
        }
        for child in self.child_nodes() {
            child.collect_leaves(out);
        }
    }

    /// Text of every leaf with the given status, in document order.
    pub fn spans(&self, diff_type: DiffType) -> Vec<&str> {
        self.leaves()
            .into_iter()
            .filter(|leaf| leaf.diff_type == Some(diff_type))
            .filter_map(|leaf| leaf.text.as_deref())
            .collect()
    }
}

/// Compare `old` against `new`.
pub fn compute_diff(old: &RichTextNode, new: &RichTextNode) -> DiffNode {
    build_tree(&mirrored_edits(&flatten(old), &flatten(new)))
}

/// Edit script for a pair of texts that is the same, mirrored, whichever
/// side comes first. The alignment is always computed from the smaller text
/// to the larger one.
fn mirrored_edits(old: &str, new: &str) -> Vec<Edit> {
    if old <= new {
        return group_runs(diff_text(old, new));
    }
    let flipped = diff_text(new, old).into_iter().map(|(op, text)| {
        let op = match op {
            EditOp::Insert => EditOp::Delete,
            EditOp::Delete => EditOp::Insert,
            EditOp::Equal => EditOp::Equal,
        };
        (op, text)
    });
    group_runs(flipped)
}

/// Rewrite every run of edits between two equalities as one deletion
/// followed by one insertion.
fn group_runs(edits: impl IntoIterator<Item = Edit>) -> Vec<Edit> {
    let mut grouped = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    let flush = |grouped: &mut Vec<Edit>, deleted: &mut String, inserted: &mut String| {
        if !deleted.is_empty() {
            grouped.push((EditOp::Delete, std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            grouped.push((EditOp::Insert, std::mem::take(inserted)));
        }
    };

    for (op, text) in edits {
        match op {
            EditOp::Delete => deleted.push_str(&text),
            EditOp::Insert => inserted.push_str(&text),
            EditOp::Equal if text.is_empty() => {}
            EditOp::Equal => {
                flush(&mut grouped, &mut deleted, &mut inserted);
                grouped.push((EditOp::Equal, text));
            }
        }
    }
    flush(&mut grouped, &mut deleted, &mut inserted);
    grouped
}

/// Compare two JSON trees. Input that is not a document tree counts as an
/// empty document.
pub fn compute_diff_json(old: &Value, new: &Value) -> DiffNode {
    compute_diff(&tree_or_empty(old), &tree_or_empty(new))
}

/// Parse a JSON tree for comparison, falling back to an empty document.
pub(crate) fn tree_or_empty(value: &Value) -> RichTextNode {
    match serde_json::from_value::<RichTextNode>(value.clone()) {
        Ok(tree) => tree,
        Err(e) => {
            log::debug!("Diffing unparseable tree as empty document: {}", e);
            RichTextNode::doc(Vec::new())
        }
    }
}

/// Cut the edit stream into paragraphs and turn each fragment into a leaf.
fn build_tree(edits: &[Edit]) -> DiffNode {
    let mut paragraphs: Vec<Vec<DiffNode>> = vec![Vec::new()];

    for (op, text) in edits {
        let whitespace = text.trim().is_empty();
        let diff_type = match op {
            EditOp::Equal => DiffType::None,
            EditOp::Insert if whitespace => DiffType::None,
            EditOp::Insert => DiffType::Added,
            // Removed whitespace is not shown at all.
            EditOp::Delete if whitespace => continue,
            EditOp::Delete => DiffType::Removed,
        };

        for (i, segment) in text.split(BLOCK_SEPARATOR).enumerate() {
            if i > 0 {
                paragraphs.push(Vec::new());
            }
            if segment.is_empty() {
                continue;
            }
            if let Some(current) = paragraphs.last_mut() {
                push_leaf(current, segment, diff_type);
            }
        }
    }

    let children = paragraphs
        .into_iter()
        .map(|mut leaves| {
            if leaves.is_empty() {
                leaves.push(DiffNode::leaf(PLACEHOLDER_TEXT, DiffType::None));
            }
            DiffNode::container(PARAGRAPH, leaves)
        })
        .collect();
    DiffNode::container(DOC, children)
}

fn push_leaf(leaves: &mut Vec<DiffNode>, text: &str, diff_type: DiffType) {
    if let Some(last) = leaves.last_mut()
        && last.diff_type == Some(diff_type)
        && let Some(existing) = last.text.as_mut()
    {
        existing.push_str(text);
        return;
    }
    leaves.push(DiffNode::leaf(text, diff_type));
}

/// Character counts of a diff, for list views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DiffSummary {
    /// Characters only in the new version
    pub added_chars: usize,
    /// Characters only in the old version
    pub removed_chars: usize,
}

impl DiffSummary {
    /// Count the added and removed characters of `diff`.
    pub fn of(diff: &DiffNode) -> Self {
        let count = |diff_type| {
            diff.spans(diff_type)
                .iter()
                .map(|span| span.chars().count())
                .sum()
        };
        Self {
            added_chars: count(DiffType::Added),
            removed_chars: count(DiffType::Removed),
        }
    }

    /// True when anything was added or removed.
    pub fn has_changes(&self) -> bool {
        self.added_chars > 0 || self.removed_chars > 0
    }
}
