//! Plain-text view of a tree, used by the diff engine and word counts.

use super::{HARD_BREAK, RichTextNode};

/// Separator placed between flattened block nodes.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Reduce a tree to its plain-text content.
///
/// Text leaves contribute their text and [`HARD_BREAK`] nodes a newline.
/// Paragraph-like nodes concatenate their inline content, other containers join
/// their non-empty children with a blank line. Other atoms contribute nothing.
pub fn flatten(tree: &RichTextNode) -> String {
    let mut out = String::new();
    flatten_into(tree, &mut out);
    out
}

fn flatten_into(node: &RichTextNode, out: &mut String) {
    if node.is_text() {
        out.push_str(node.text.as_deref().unwrap_or_default());
        return;
    }
    if node.node_type == HARD_BREAK {
        out.push('\n');
        return;
    }
    if node.is_leaf() {
        return;
    }

    if node.is_textblock() {
        for child in node.child_nodes() {
            flatten_into(child, out);
        }
        return;
    }

    let mut first = true;
    for child in node.child_nodes() {
        let block = flatten(child);
        if block.is_empty() {
            continue;
        }
        if !first {
            out.push_str(BLOCK_SEPARATOR);
        }
        out.push_str(&block);
        first = false;
    }
}

/// Number of whitespace-separated words in the flattened tree.
pub fn word_count(tree: &RichTextNode) -> usize {
    flatten(tree).split_whitespace().count()
}
