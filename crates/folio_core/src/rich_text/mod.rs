//! Canonical rich-text document tree.
//!
//! A [`RichTextNode`] is the in-memory form of a formatted document: typed
//! nodes with ordered children, and text leaves carrying inline marks. The JSON
//! shape matches the ProseMirror/TipTap document JSON that editors emit:
//!
//! ```json
//! { "type": "doc", "content": [
//!     { "type": "paragraph", "content": [
//!         { "type": "text", "text": "Hello, ", "marks": [{ "type": "bold" }] },
//!         { "type": "text", "text": "World!" }
//!     ] }
//! ] }
//! ```
//!
//! `nodeType` and `children` are accepted as aliases of `type` and `content`.

mod flatten;
mod normalize;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub use flatten::{BLOCK_SEPARATOR, flatten, word_count};
pub use normalize::{normalize, validate, validate_document};

/// Root node type.
pub const DOC: &str = "doc";
/// Plain paragraph node type.
pub const PARAGRAPH: &str = "paragraph";
/// Text leaf node type.
pub const TEXT: &str = "text";
/// Explicit line break inside a paragraph.
pub const HARD_BREAK: &str = "hardBreak";

/// Text carried by the single leaf of an otherwise empty paragraph.
pub const PLACEHOLDER_TEXT: &str = " ";

/// Nodes whose children are inline content. An empty one is repaired with a
/// placeholder leaf.
const TEXTBLOCK_TYPES: &[&str] = &[PARAGRAPH, "heading", "codeBlock"];

/// Nodes that never have children.
const ATOM_TYPES: &[&str] = &[HARD_BREAK, "horizontalRule", "image", "mention"];

/// An inline formatting mark on a text leaf.
///
/// Marks form a set keyed by `mark_type`: a leaf never carries two marks of
/// the same type, and their order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Mark {
    /// Mark type, e.g. "bold", "italic", "link"
    #[serde(rename = "type")]
    #[serde(alias = "markType")]
    pub mark_type: String,

    /// Mark attributes, e.g. `href` for links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, serde_json::Value>>,
}

impl Mark {
    /// A mark without attributes.
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: None,
        }
    }

    /// A mark with a single attribute.
    pub fn with_attr(
        mark_type: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(key.into(), value);
        Self {
            mark_type: mark_type.into(),
            attrs: Some(attrs),
        }
    }
}

/// A node of a rich-text document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RichTextNode {
    /// Node type tag ("doc", "paragraph", "heading", "text", ...)
    #[serde(rename = "type")]
    #[serde(alias = "nodeType")]
    pub node_type: String,

    /// Node attributes, e.g. `level` for headings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, serde_json::Value>>,

    /// Ordered child nodes (absent on leaves)
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "children")]
    pub children: Option<Vec<RichTextNode>>,

    /// Text of a text leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline marks of a text leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
}

impl RichTextNode {
    /// A bare node of the given type with no children.
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: None,
            children: None,
            text: None,
            marks: None,
        }
    }

    /// A container node with the given children.
    pub fn element(node_type: impl Into<String>, children: Vec<RichTextNode>) -> Self {
        Self {
            children: Some(children),
            ..Self::new(node_type)
        }
    }

    /// A `doc` root node.
    pub fn doc(children: Vec<RichTextNode>) -> Self {
        Self::element(DOC, children)
    }

    /// A paragraph node.
    pub fn paragraph(children: Vec<RichTextNode>) -> Self {
        Self::element(PARAGRAPH, children)
    }

    /// A heading of the given level.
    pub fn heading(level: u8, children: Vec<RichTextNode>) -> Self {
        Self::element("heading", children).with_attr("level", serde_json::Value::from(level))
    }

    /// An unmarked text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(TEXT)
        }
    }

    /// A text leaf with marks.
    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            marks: Some(marks),
            ..Self::text(text)
        }
    }

    /// A line break leaf.
    pub fn hard_break() -> Self {
        Self::new(HARD_BREAK)
    }

    /// Builder: set a node attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Build a document from plain text.
    ///
    /// Each `"\n\n"`-separated chunk becomes a paragraph; single newlines
    /// inside a chunk become [`HARD_BREAK`] nodes.
    pub fn from_plain_text(text: &str) -> Self {
        let paragraphs = text
            .split("\n\n")
            .map(|chunk| {
                let mut inline = Vec::new();
                for (i, line) in chunk.split('\n').enumerate() {
                    if i > 0 {
                        inline.push(Self::hard_break());
                    }
                    if !line.is_empty() {
                        inline.push(Self::text(line));
                    }
                }
                Self::paragraph(inline)
            })
            .collect();
        normalize(&Self::doc(paragraphs))
    }

    /// True for text leaves.
    pub fn is_text(&self) -> bool {
        self.node_type == TEXT
    }

    /// True for nodes that never carry children (text and atom nodes).
    pub fn is_leaf(&self) -> bool {
        self.is_text() || ATOM_TYPES.contains(&self.node_type.as_str())
    }

    /// True for paragraph-like nodes holding inline content.
    pub fn is_textblock(&self) -> bool {
        TEXTBLOCK_TYPES.contains(&self.node_type.as_str())
    }

    /// Children as a slice (empty for leaves).
    pub fn child_nodes(&self) -> &[RichTextNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Mark types of this leaf, in canonical order.
    pub fn mark_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .marks
            .iter()
            .flatten()
            .map(|m| m.mark_type.as_str())
            .collect();
        types.sort_unstable();
        types
    }
}
