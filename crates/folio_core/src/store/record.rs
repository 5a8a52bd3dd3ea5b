//! Document records, their persisted form and the inputs that create and
//! change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{ContentInput, CrdtPayload};
use crate::error::{FolioError, Result};
use crate::rich_text::{RichTextNode, flatten};

/// Fields the store manages itself.
const RESERVED_FIELDS: &[&str] = &["_id", "createdAt", "updatedAt"];

/// A document as returned to callers, with its content materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Record id (UUID v4)
    #[serde(rename = "_id")]
    pub id: String,

    /// Document title
    pub title: String,

    /// Materialized content tree
    pub content: RichTextNode,

    /// Owning user
    pub owner_id: Option<String>,

    /// Parent folder or document
    pub parent_id: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,

    /// Any other fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentRecord {
    /// Plain-text rendering of the content.
    pub fn plain_text(&self) -> String {
        flatten(&self.content)
    }
}

/// A record as persisted by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: CrdtPayload,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredRecord {
    /// Parse a backend value. `key` labels the corruption error.
    pub fn from_value(key: &str, value: Value) -> Result<Self> {
        CrdtPayload::from_stored(key, value.get("content").unwrap_or(&Value::Null))?;
        serde_json::from_value(value).map_err(|e| FolioError::corruption(key, e))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn into_record(self, content: RichTextNode) -> DocumentRecord {
        DocumentRecord {
            id: self.id,
            title: self.title,
            content,
            owner_id: self.owner_id,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            extra: self.extra,
        }
    }
}

/// Input to [`DocumentStore::create`](super::DocumentStore::create).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDocument {
    /// Document title
    pub title: String,
    /// Initial content; an empty document when absent
    pub content: Option<ContentInput>,
    /// Owning user
    pub owner_id: Option<String>,
    /// Parent folder or document
    pub parent_id: Option<String>,
    /// Other fields stored verbatim
    pub extra: Map<String, Value>,
}

impl NewDocument {
    /// A titled document with the given content.
    pub fn new(title: impl Into<String>, content: impl Into<ContentInput>) -> Self {
        Self {
            title: title.into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Builder: set the owner.
    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Builder: set the parent.
    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Builder: set an extra field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse a JSON data object.
    ///
    /// Store-managed fields (`_id`, `createdAt`, `updatedAt`) are ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = expect_object(value)?;
        let mut doc = NewDocument::default();
        for (key, value) in map {
            match key.as_str() {
                "title" => doc.title = expect_string(key, value)?,
                "content" => doc.content = Some(ContentInput::from_json(value)?),
                "ownerId" => doc.owner_id = expect_optional_string(key, value)?,
                "parentId" => doc.parent_id = expect_optional_string(key, value)?,
                k if RESERVED_FIELDS.contains(&k) => {}
                _ => {
                    doc.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(doc)
    }
}

/// Partial update for [`DocumentStore::update`](super::DocumentStore::update).
///
/// Absent fields are left alone. An extra field set to `null` is removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    /// New title
    pub title: Option<String>,
    /// New content, applied as CRDT operations
    pub content: Option<ContentInput>,
    /// New owner (`Some(None)` clears it)
    pub owner_id: Option<Option<String>>,
    /// New parent (`Some(None)` clears it)
    pub parent_id: Option<Option<String>>,
    /// Other fields to set or remove
    pub extra: Map<String, Value>,
}

impl DocumentPatch {
    /// A patch replacing the content only.
    pub fn content(content: impl Into<ContentInput>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A patch replacing the title only.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON partial object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = expect_object(value)?;
        let mut patch = DocumentPatch::default();
        for (key, value) in map {
            match key.as_str() {
                "title" => patch.title = Some(expect_string(key, value)?),
                "content" => patch.content = Some(ContentInput::from_json(value)?),
                "ownerId" => patch.owner_id = Some(expect_optional_string(key, value)?),
                "parentId" => patch.parent_id = Some(expect_optional_string(key, value)?),
                k if RESERVED_FIELDS.contains(&k) => {}
                _ => {
                    patch.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(patch)
    }

    /// Apply every field except `content`.
    pub(crate) fn apply_fields(self, record: &mut StoredRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(owner_id) = self.owner_id {
            record.owner_id = owner_id;
        }
        if let Some(parent_id) = self.parent_id {
            record.parent_id = parent_id;
        }
        for (key, value) in self.extra {
            if value.is_null() {
                record.extra.remove(&key);
            } else {
                record.extra.insert(key, value);
            }
        }
    }
}

/// Equality match over top-level persisted fields.
///
/// An empty query matches every record. A `null` value also matches a missing
/// field. Content is stored as replicated state and cannot be queried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fields: Map<String, Value>,
}

impl Query {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match one id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().where_eq("_id", Value::String(id.into()))
    }

    /// Builder: require `field == value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Parse a JSON query object.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(Self {
            fields: expect_object(value)?.clone(),
        })
    }

    /// The id this query pins, if any.
    pub fn id(&self) -> Option<&str> {
        self.fields.get("_id").and_then(Value::as_str)
    }

    /// True if `record` (a persisted JSON record) satisfies every condition.
    pub fn matches(&self, record: &Value) -> bool {
        self.fields.iter().all(|(field, expected)| {
            match record.get(field) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            }
        })
    }
}

fn expect_object(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FolioError::Validation(format!("expected a JSON object, got {value}")))
}

fn expect_string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FolioError::Validation(format!("'{key}' must be a string")))
}

fn expect_optional_string(key: &str, value: &Value) -> Result<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    expect_string(key, value).map(Some)
}
