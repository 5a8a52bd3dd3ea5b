//! Store configuration.
//!
//! [`StoreConfig`] selects where and how documents are persisted. It is stored
//! as TOML, by default at `~/.config/folio/config.toml` on Unix systems.
//!
//! # Async-first Design
//!
//! Use `StoreConfig::load_from()` with an `AsyncFileSystem` to load config.
//! For synchronous contexts, use the `_sync` variants.
//!
//! # Example
//!
//! ```ignore
//! use folio_core::config::StoreConfig;
//!
//! let config = StoreConfig::load()?;
//! let store = config.open_store()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::crdt::{CrdtAdapter, DEFAULT_CACHE_CAPACITY};
use crate::error::{FolioError, Result};
use crate::fs::{AsyncFileSystem, FileSystem, RealFileSystem, SyncToAsyncFs};
use crate::store::{DocumentStore, FileBackend, MemoryBackend, RecordBackend};
use crate::version::{DOCUMENTS_COLLECTION, VERSIONS_COLLECTION};

/// Database file name inside `data_dir` for the SQLite backend.
pub const SQLITE_FILE_NAME: &str = "folio.db";

/// Which [`RecordBackend`] holds the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per record under `data_dir`
    #[default]
    File,
    /// Process memory; nothing survives a restart
    Memory,
    /// SQLite database at `data_dir/folio.db` (requires the `sqlite` feature)
    Sqlite,
}

/// Settings of a document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the records
    pub data_dir: PathBuf,

    /// Record backend
    pub backend: BackendKind,

    /// Live replicas kept in memory
    pub cache_capacity: usize,

    /// Collection of document records
    pub documents_collection: String,

    /// Collection of version snapshots
    pub versions_collection: String,
}

impl StoreConfig {
    /// Create a config storing records under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend: BackendKind::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            documents_collection: DOCUMENTS_COLLECTION.to_string(),
            versions_collection: VERSIONS_COLLECTION.to_string(),
        }
    }

    /// Open the configured record backend.
    pub fn open_backend(&self) -> Result<Arc<dyn RecordBackend>> {
        match self.backend {
            BackendKind::File => Ok(Arc::new(FileBackend::new(
                SyncToAsyncFs::new(RealFileSystem),
                self.data_dir.clone(),
            ))),
            BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendKind::Sqlite => self.open_sqlite(),
        }
    }

    #[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
    fn open_sqlite(&self) -> Result<Arc<dyn RecordBackend>> {
        std::fs::create_dir_all(&self.data_dir)?;
        let backend = crate::store::SqliteBackend::open(self.data_dir.join(SQLITE_FILE_NAME))?;
        Ok(Arc::new(backend))
    }

    #[cfg(not(all(not(target_arch = "wasm32"), feature = "sqlite")))]
    fn open_sqlite(&self) -> Result<Arc<dyn RecordBackend>> {
        Err(FolioError::BackendUnavailable("sqlite".to_string()))
    }

    /// Open a document store over the configured backend.
    pub fn open_store(&self) -> Result<DocumentStore> {
        let backend = self.open_backend()?;
        log::debug!(
            "Opened {:?} store at {:?} (cache capacity {})",
            self.backend,
            self.data_dir,
            self.cache_capacity
        );
        Ok(DocumentStore::with_adapter(
            backend,
            CrdtAdapter::with_capacity(self.cache_capacity),
        ))
    }

    // ========================================================================
    // AsyncFileSystem-based methods (work on all platforms including WASM)
    // ========================================================================

    /// Load config from a specific path using an AsyncFileSystem.
    pub async fn load_from<FS: AsyncFileSystem>(fs: &FS, path: &Path) -> Result<Self> {
        let contents = fs
            .read_to_string(path)
            .await
            .map_err(|e| FolioError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let config: StoreConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path using an AsyncFileSystem.
    pub async fn save_to<FS: AsyncFileSystem>(&self, fs: &FS, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs.create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs.write_file(path, &contents)
            .await
            .map_err(|e| FolioError::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(())
    }

    /// Load config from an AsyncFileSystem, returning the default if it is
    /// missing or unreadable.
    pub async fn load_from_or_default<FS: AsyncFileSystem>(fs: &FS, path: &Path) -> Self {
        match Self::load_from(fs, path).await {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default config ({})", e);
                Self::default()
            }
        }
    }

    // ========================================================================
    // Sync wrappers. Prefer the async APIs above.
    // ========================================================================

    /// Sync wrapper for [`StoreConfig::load_from`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_sync<FS: FileSystem>(fs: FS, path: &Path) -> Result<Self> {
        futures_lite::future::block_on(Self::load_from(&SyncToAsyncFs::new(fs), path))
    }

    /// Sync wrapper for [`StoreConfig::save_to`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_sync<FS: FileSystem>(&self, fs: FS, path: &Path) -> Result<()> {
        futures_lite::future::block_on(self.save_to(&SyncToAsyncFs::new(fs), path))
    }

    /// Sync wrapper for [`StoreConfig::load_from_or_default`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_or_default_sync<FS: FileSystem>(fs: FS, path: &Path) -> Self {
        futures_lite::future::block_on(Self::load_from_or_default(&SyncToAsyncFs::new(fs), path))
    }
}

// ============================================================================
// Native-only implementation (not available in WASM)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio");
        Self::new(data_dir)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl StoreConfig {
    /// Get the config file path (~/.config/folio/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("config.toml"))
    }

    /// Load config from the default location, or the default config if the
    /// file doesn't exist.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from_sync(RealFileSystem, &path),
            _ => Ok(Self::default()),
        }
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(FolioError::NoConfigDir)?;
        self.save_to_sync(RealFileSystem, &path)
    }
}

#[cfg(target_arch = "wasm32")]
impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("/folio")
    }
}
