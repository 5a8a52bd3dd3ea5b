use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for folio operations
#[derive(Debug, Error)]
pub enum FolioError {
    // Tree errors
    /// A tree that normalization cannot repair.
    #[error("Invalid document tree: {0}")]
    Validation(String),

    // Replication errors
    /// Persisted replicated state or record that fails to deserialize.
    #[error("Corrupted storage for '{key}': {reason}")]
    StorageCorruption { key: String, reason: String },

    /// Two writers reached the same document's log at once.
    #[error("Concurrent write detected on '{0}'")]
    ConcurrentWriteConflict(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(String),

    // Database errors
    #[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl FolioError {
    /// Build a [`FolioError::StorageCorruption`] for the given document key.
    pub fn corruption(key: impl Into<String>, reason: impl ToString) -> Self {
        FolioError::StorageCorruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

/// Result type alias for folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

/// A serializable representation of FolioError for IPC (e.g., an HTTP layer)
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&FolioError> for SerializableError {
    fn from(err: &FolioError) -> Self {
        let kind = match err {
            FolioError::Validation(_) => "Validation",
            FolioError::StorageCorruption { .. } => "StorageCorruption",
            FolioError::ConcurrentWriteConflict(_) => "ConcurrentWriteConflict",
            FolioError::Io(_) => "Io",
            FolioError::FileRead { .. } => "FileRead",
            FolioError::FileWrite { .. } => "FileWrite",
            FolioError::Json(_) => "Json",
            FolioError::ConfigParse(_) => "ConfigParse",
            FolioError::ConfigSerialize(_) => "ConfigSerialize",
            FolioError::NoConfigDir => "NoConfigDir",
            FolioError::BackendUnavailable(_) => "BackendUnavailable",
            #[cfg(all(not(target_arch = "wasm32"), feature = "sqlite"))]
            FolioError::Sqlite(_) => "Sqlite",
        }
        .to_string();

        let path = match err {
            FolioError::FileRead { path, .. } => Some(path.clone()),
            FolioError::FileWrite { path, .. } => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<FolioError> for SerializableError {
    fn from(err: FolioError) -> Self {
        SerializableError::from(&err)
    }
}
