//! In-memory record backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use super::backend::RecordBackend;
use crate::error::Result;
use crate::fs::BoxFuture;

/// Records held in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections.get(collection).map_or(0, BTreeMap::len)
    }
}

impl RecordBackend for MemoryBackend {
    fn load<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            Ok(collections
                .get(collection)
                .and_then(|records| records.get(id))
                .cloned())
        })
    }

    fn save<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        record: &'a Value,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), record.clone());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            Ok(collections
                .get_mut(collection)
                .is_some_and(|records| records.remove(id).is_some()))
        })
    }

    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            Ok(collections
                .get(collection)
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn ids<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            Ok(collections
                .get(collection)
                .map(|records| records.keys().cloned().collect())
                .unwrap_or_default())
        })
    }
}
