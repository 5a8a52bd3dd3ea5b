//! One JSON file per record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::backend::{RecordBackend, check_segment, record_key};
use crate::error::{FolioError, Result};
use crate::fs::{AsyncFileSystem, BoxFuture};

const RECORD_EXTENSION: &str = "json";

/// Stores each record at `<root>/<collection>/<id>.json`.
///
/// ```ignore
/// use folio_core::fs::{RealFileSystem, SyncToAsyncFs};
/// use folio_core::store::FileBackend;
///
/// let backend = FileBackend::new(SyncToAsyncFs::new(RealFileSystem), "/var/lib/folio");
/// ```
pub struct FileBackend<FS: AsyncFileSystem> {
    fs: FS,
    root: PathBuf,
}

impl<FS: AsyncFileSystem> FileBackend<FS> {
    /// Create a backend rooted at `root`.
    pub fn new(fs: FS, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying filesystem.
    pub fn fs(&self) -> &FS {
        &self.fs
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        check_segment("collection", collection)?;
        Ok(self.root.join(collection))
    }

    /// Path of one record file.
    pub fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        check_segment("id", id)?;
        Ok(self
            .collection_dir(collection)?
            .join(format!("{id}.{RECORD_EXTENSION}")))
    }

    async fn read_record(&self, key: &str, path: &Path) -> Result<Value> {
        let text = self
            .fs
            .read_to_string(path)
            .await
            .map_err(|source| FolioError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        parse_record(key, &text)
    }

    /// Id and path of every record file in `collection`.
    async fn record_files(&self, collection: &str) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.collection_dir(collection)?;
        if !self.fs.is_dir(&dir).await {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for path in self.fs.list_files(&dir).await? {
            if path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                log::warn!("Skipping record file with non UTF-8 name: {:?}", path);
                continue;
            };
            files.push((id.to_string(), path.clone()));
        }
        Ok(files)
    }
}

fn parse_record(key: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| FolioError::corruption(key, e))
}

impl<FS: AsyncFileSystem> RecordBackend for FileBackend<FS> {
    fn load<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let path = self.record_path(collection, id)?;
            let text = self
                .fs
                .read_optional(&path)
                .await
                .map_err(|source| FolioError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            match text {
                Some(text) => parse_record(&record_key(collection, id), &text).map(Some),
                None => Ok(None),
            }
        })
    }

    fn save<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        record: &'a Value,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = self.record_path(collection, id)?;
            let dir = self.collection_dir(collection)?;
            self.fs.create_dir_all(&dir).await?;

            let text = serde_json::to_string_pretty(record)?;
            self.fs
                .write_file(&path, &text)
                .await
                .map_err(|source| FolioError::FileWrite { path, source })
        })
    }

    fn remove<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let path = self.record_path(collection, id)?;
            match self.fs.delete_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(FolioError::Io(e)),
            }
        })
    }

    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move {
            let mut records = Vec::new();
            for (id, path) in self.record_files(collection).await? {
                let key = record_key(collection, &id);
                records.push(self.read_record(&key, &path).await?);
            }
            Ok(records)
        })
    }

    fn ids<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let files = self.record_files(collection).await?;
            Ok(files.into_iter().map(|(id, _)| id).collect())
        })
    }
}
