//! Document content as it arrives at and leaves the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FolioError, Result};
use crate::rich_text::RichTextNode;

/// `type` tag of a wrapped replicated state.
pub const CRDT_PAYLOAD_TYPE: &str = "crdt";

/// Content supplied by a caller, classified once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentInput {
    /// Plain text, split into paragraphs on blank lines.
    Plain(String),
    /// A rich-text tree.
    Tree(RichTextNode),
    /// Replicated state produced by another replica.
    Wrapped(Vec<u8>),
}

impl ContentInput {
    /// Classify a JSON content value.
    ///
    /// - a string is plain text
    /// - `{"type": "crdt", "state": [..]}` is a wrapped state
    /// - any other object is parsed as a tree
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(ContentInput::Plain(text.clone())),
            Value::Object(map) if map.get("type").and_then(Value::as_str) == Some(CRDT_PAYLOAD_TYPE) => {
                let payload: CrdtPayload = serde_json::from_value(value.clone()).map_err(|e| {
                    FolioError::Validation(format!("malformed crdt payload: {e}"))
                })?;
                Ok(ContentInput::Wrapped(payload.state))
            }
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(ContentInput::Tree)
                .map_err(|e| FolioError::Validation(format!("malformed content tree: {e}"))),
            other => Err(FolioError::Validation(format!(
                "content must be a string or an object, got {other}"
            ))),
        }
    }
}

impl From<&str> for ContentInput {
    fn from(text: &str) -> Self {
        ContentInput::Plain(text.to_string())
    }
}

impl From<String> for ContentInput {
    fn from(text: String) -> Self {
        ContentInput::Plain(text)
    }
}

impl From<RichTextNode> for ContentInput {
    fn from(tree: RichTextNode) -> Self {
        ContentInput::Tree(tree)
    }
}

/// Persisted form of a record's `content` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdtPayload {
    /// Always [`CRDT_PAYLOAD_TYPE`].
    #[serde(rename = "type")]
    pub payload_type: String,
    /// The replicated state bytes.
    pub state: Vec<u8>,
}

impl CrdtPayload {
    /// Wrap state bytes.
    pub fn new(state: Vec<u8>) -> Self {
        Self {
            payload_type: CRDT_PAYLOAD_TYPE.to_string(),
            state,
        }
    }

    /// Parse a persisted `content` value. `key` labels the corruption error.
    pub fn from_stored(key: &str, value: &Value) -> Result<Self> {
        let payload: CrdtPayload = serde_json::from_value(value.clone())
            .map_err(|e| FolioError::corruption(key, format!("content: {e}")))?;
        if payload.payload_type != CRDT_PAYLOAD_TYPE {
            return Err(FolioError::corruption(
                key,
                format!("unexpected content type '{}'", payload.payload_type),
            ));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_plain_string() {
        let input = ContentInput::from_json(&json!("Hello")).unwrap();
        assert_eq!(input, ContentInput::Plain("Hello".to_string()));
    }

    #[test]
    fn test_classify_tree() {
        let input = ContentInput::from_json(&json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": "x" }] }]
        }))
        .unwrap();
        assert_eq!(input, ContentInput::Tree(RichTextNode::from_plain_text("x")));
    }

    #[test]
    fn test_classify_wrapped_state() {
        let input = ContentInput::from_json(&json!({ "type": "crdt", "state": [1, 2, 3] })).unwrap();
        assert_eq!(input, ContentInput::Wrapped(vec![1, 2, 3]));
    }

    #[test]
    fn test_malformed_inputs_are_validation_errors() {
        for value in [
            json!(42),
            json!({ "type": "crdt", "state": "nope" }),
            json!({ "content": [] }),
        ] {
            assert!(matches!(
                ContentInput::from_json(&value),
                Err(FolioError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = CrdtPayload::new(vec![0, 255]);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({ "type": "crdt", "state": [0, 255] }));
        assert_eq!(CrdtPayload::from_stored("documents/a", &value).unwrap(), payload);
    }

    #[test]
    fn test_stored_payload_with_wrong_type_is_corruption() {
        let err = CrdtPayload::from_stored("documents/a", &json!({ "type": "doc", "state": [] }))
            .unwrap_err();
        assert!(matches!(err, FolioError::StorageCorruption { .. }));
    }
}
