//! SQLite-backed record persistence.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use super::backend::{RecordBackend, record_key};
use crate::error::{FolioError, Result};
use crate::fs::BoxFuture;

/// Records stored as JSON text in one SQLite table.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex` for thread-safe access.
/// SQLite itself is used in serialized threading mode.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a SQLite database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or if schema
    /// initialization fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    /// Create an in-memory SQLite database for testing.
    ///
    /// Data is lost when the backend is dropped.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse(collection: &str, id: &str, body: &str) -> Result<Value> {
        serde_json::from_str(body).map_err(|e| FolioError::corruption(record_key(collection, id), e))
    }
}

impl RecordBackend for SqliteBackend {
    fn load<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let body: Option<String> = self
                .conn()
                .query_row(
                    "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|body| Self::parse(collection, id, &body))
                .transpose()
        })
    }

    fn save<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        record: &'a Value,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = serde_json::to_string(record)?;
            self.conn().execute(
                "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
                params![collection, id, body],
            )?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let changed = self.conn().execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            Ok(changed > 0)
        })
    }

    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move {
            let rows: Vec<(String, String)> = {
                let conn = self.conn();
                let mut stmt =
                    conn.prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY id")?;
                let rows = stmt
                    .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            rows.iter()
                .map(|(id, body)| Self::parse(collection, id, body))
                .collect()
        })
    }

    fn ids<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let conn = self.conn();
            let mut stmt = conn.prepare("SELECT id FROM records WHERE collection = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![collection], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }
}
