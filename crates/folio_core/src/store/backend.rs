//! Record persistence abstraction.

use serde_json::Value;

use crate::error::{FolioError, Result};
use crate::fs::BoxFuture;

/// Persistence for JSON records grouped in collections.
///
/// Records are whole JSON objects keyed by `(collection, id)`. Backends do not
/// interpret them beyond storing and returning them, and report a stored
/// record that is not valid JSON as [`FolioError::StorageCorruption`].
///
/// The trait is object-safe; methods return boxed futures so a store can hold
/// an `Arc<dyn RecordBackend>`.
pub trait RecordBackend: Send + Sync {
    /// Load one record. `None` if absent.
    fn load<'a>(&'a self, collection: &'a str, id: &'a str)
    -> BoxFuture<'a, Result<Option<Value>>>;

    /// Create or overwrite one record.
    fn save<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        record: &'a Value,
    ) -> BoxFuture<'a, Result<()>>;

    /// Remove one record. Returns whether it existed.
    fn remove<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// All records of a collection, in no particular order.
    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Value>>>;

    /// Ids of the records of a collection, without reading the records.
    fn ids<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// Cache and error key of a record.
pub fn record_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// Reject names that could escape a collection when used as path segments.
pub(crate) fn check_segment(kind: &str, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(FolioError::Validation(format!("invalid {kind} name '{name}'")));
    }
    Ok(())
}
