//! Live yrs replica of one document's content.
//!
//! The tree lives in an `XmlFragment` named `content`, laid out the way
//! y-prosemirror lays out an editor document:
//!
//! - every non-text node is an `XmlElement` tagged with its node type, with its
//!   attributes stored as one JSON string under [`ATTRS_KEY`]
//! - every run of consecutive text leaves is one `XmlText`, each leaf inserted
//!   with its marks as formatting attributes (mark type to JSON mark attrs)
//!
//! Attributes of the root `doc` node are kept in the `meta` map.

use std::collections::BTreeMap;
use std::sync::Arc;

use yrs::types::Attrs;
use yrs::types::text::YChange;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Doc, Map, MapRef, Out, ReadTxn, StateVector, Text, Transact, TransactionMut, Update, Xml,
    XmlElementPrelim, XmlElementRef, XmlFragment, XmlFragmentRef, XmlOut, XmlTextPrelim,
    XmlTextRef,
};

use crate::error::{FolioError, Result};
use crate::rich_text::{DOC, Mark, RichTextNode, TEXT, normalize};

/// Name of the XmlFragment holding the document tree.
const CONTENT_NAME: &str = "content";

/// Name of the Y.Map holding root attributes.
const META_NAME: &str = "meta";

/// Element attribute (and meta key) holding JSON-encoded node attributes.
const ATTRS_KEY: &str = "attrs";

/// Formatting value for a mark without attributes.
const NO_MARK_ATTRS: &str = "null";

type AttrMap = BTreeMap<String, serde_json::Value>;

/// A deserialized, mutable replicated log for one document.
pub struct ContentReplica {
    doc: Doc,
    content: XmlFragmentRef,
    meta: MapRef,
}

impl Default for ContentReplica {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentReplica {
    /// Create an empty replica.
    pub fn new() -> Self {
        let doc = Doc::new();
        let content = doc.get_or_insert_xml_fragment(CONTENT_NAME);
        let meta = doc.get_or_insert_map(META_NAME);
        Self { doc, content, meta }
    }

    /// Create a replica holding `tree`.
    ///
    /// The tree is expected to be normalized.
    pub fn from_tree(tree: &RichTextNode) -> Result<Self> {
        let replica = Self::new();
        replica.replace_tree(tree)?;
        Ok(replica)
    }

    /// Deserialize a replica from a v1 update.
    ///
    /// `key` only labels the error if the bytes cannot be decoded.
    pub fn from_state(key: &str, state: &[u8]) -> Result<Self> {
        let replica = Self::new();
        replica.apply_state(key, state)?;
        Ok(replica)
    }

    /// Merge a v1 update produced by any replica of the same document.
    pub fn apply_state(&self, key: &str, state: &[u8]) -> Result<()> {
        let update = Update::decode_v1(state).map_err(|e| FolioError::corruption(key, e))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| FolioError::corruption(key, e))?;
        Ok(())
    }

    /// Serialize the whole log as a v1 update.
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Replace the content with `tree` in a single transaction.
    ///
    /// Existing content is deleted as CRDT operations and the new tree is
    /// inserted after it, so the result merges with replicas that diverged
    /// from the previous state.
    pub fn replace_tree(&self, tree: &RichTextNode) -> Result<()> {
        let root_attrs = encode_attrs(tree.attrs.as_ref())?;

        let mut txn = self.doc.transact_mut();
        let len = self.content.len(&txn);
        if len > 0 {
            self.content.remove_range(&mut txn, 0, len);
        }
        match root_attrs {
            Some(json) => {
                self.meta.insert(&mut txn, ATTRS_KEY, json);
            }
            None => {
                self.meta.remove(&mut txn, ATTRS_KEY);
            }
        }

        let mut open_text: Option<XmlTextRef> = None;
        for child in tree.child_nodes() {
            write_node(&mut txn, &self.content, &mut open_text, child)?;
        }
        Ok(())
    }

    /// Reconstruct the canonical tree held by this replica.
    pub fn to_tree(&self) -> Result<RichTextNode> {
        let txn = self.doc.transact();
        let attrs = match self.meta.get(&txn, ATTRS_KEY) {
            Some(out) => decode_attrs(&out)?,
            None => None,
        };
        let children = read_children(&txn, &self.content)?;
        let raw = RichTextNode {
            attrs,
            children: Some(children),
            ..RichTextNode::new(DOC)
        };
        Ok(normalize(&raw))
    }
}

fn encode_attrs(attrs: Option<&AttrMap>) -> Result<Option<String>> {
    match attrs {
        Some(map) if !map.is_empty() => Ok(Some(serde_json::to_string(map)?)),
        _ => Ok(None),
    }
}

fn decode_attrs(out: &Out) -> Result<Option<AttrMap>> {
    let json = out_to_string(out).ok_or_else(|| {
        FolioError::corruption(CONTENT_NAME, "node attributes are not a string")
    })?;
    let map: AttrMap = serde_json::from_str(&json)
        .map_err(|e| FolioError::corruption(CONTENT_NAME, format!("node attributes: {e}")))?;
    Ok(if map.is_empty() { None } else { Some(map) })
}

fn out_to_string(out: &Out) -> Option<String> {
    match out {
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

/// Append `node` to `parent`, reusing `open_text` for consecutive text leaves.
fn write_node<P: XmlFragment>(
    txn: &mut TransactionMut,
    parent: &P,
    open_text: &mut Option<XmlTextRef>,
    node: &RichTextNode,
) -> Result<()> {
    if node.is_text() {
        let text_ref = match open_text {
            Some(text_ref) => text_ref.clone(),
            None => {
                let text_ref = parent.push_back(txn, XmlTextPrelim::new(""));
                *open_text = Some(text_ref.clone());
                text_ref
            }
        };
        let chunk = node.text.as_deref().unwrap_or_default();
        let index = text_ref.len(&*txn);
        text_ref.insert_with_attributes(txn, index, chunk, mark_attrs(node.marks.as_deref())?);
        return Ok(());
    }

    *open_text = None;
    let element: XmlElementRef =
        parent.push_back(txn, XmlElementPrelim::empty(node.node_type.as_str()));
    if let Some(json) = encode_attrs(node.attrs.as_ref())? {
        element.insert_attribute(txn, ATTRS_KEY, json);
    }

    let mut child_text: Option<XmlTextRef> = None;
    for child in node.child_nodes() {
        write_node(txn, &element, &mut child_text, child)?;
    }
    Ok(())
}

fn mark_attrs(marks: Option<&[Mark]>) -> Result<Attrs> {
    let mut attrs = Attrs::new();
    for mark in marks.unwrap_or_default() {
        let value = match &mark.attrs {
            Some(map) => serde_json::to_string(map)?,
            None => NO_MARK_ATTRS.to_string(),
        };
        attrs.insert(Arc::from(mark.mark_type.as_str()), Any::from(value));
    }
    Ok(attrs)
}

fn read_children<T: ReadTxn, P: XmlFragment>(txn: &T, parent: &P) -> Result<Vec<RichTextNode>> {
    let mut children = Vec::new();
    for index in 0..parent.len(txn) {
        match parent.get(txn, index) {
            Some(XmlOut::Element(element)) => children.push(read_element(txn, &element)?),
            Some(XmlOut::Text(text_ref)) => children.extend(read_text(txn, &text_ref)?),
            Some(XmlOut::Fragment(fragment)) => children.extend(read_children(txn, &fragment)?),
            None => {}
        }
    }
    Ok(children)
}

fn read_element<T: ReadTxn>(txn: &T, element: &XmlElementRef) -> Result<RichTextNode> {
    let mut node = RichTextNode::new(element.tag().to_string());
    if let Some(out) = element.get_attribute(txn, ATTRS_KEY) {
        node.attrs = decode_attrs(&out)?;
    }
    if !node.is_leaf() {
        node.children = Some(read_children(txn, element)?);
    }
    Ok(node)
}

fn read_text<T: ReadTxn>(txn: &T, text_ref: &XmlTextRef) -> Result<Vec<RichTextNode>> {
    let mut leaves = Vec::new();
    for chunk in text_ref.diff(txn, YChange::identity) {
        let Some(text) = out_to_string(&chunk.insert) else {
            // Embeds are never written by this module.
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let mut marks = Vec::new();
        if let Some(attrs) = chunk.attributes.as_deref() {
            for (mark_type, value) in attrs {
                marks.push(read_mark(mark_type, value)?);
            }
        }

        leaves.push(RichTextNode {
            text: Some(text),
            marks: if marks.is_empty() { None } else { Some(marks) },
            ..RichTextNode::new(TEXT)
        });
    }
    Ok(leaves)
}

fn read_mark(mark_type: &str, value: &Any) -> Result<Mark> {
    let attrs = match value {
        Any::String(json) if json.as_ref() != NO_MARK_ATTRS => {
            let map: AttrMap = serde_json::from_str(json).map_err(|e| {
                FolioError::corruption(CONTENT_NAME, format!("attributes of mark '{mark_type}': {e}"))
            })?;
            Some(map)
        }
        _ => None,
    };
    Ok(Mark {
        mark_type: mark_type.to_string(),
        attrs,
    })
}
