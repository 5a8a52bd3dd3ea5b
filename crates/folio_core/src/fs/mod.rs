//! Filesystem abstraction.
//!
//! The file record backend and the config loader go through [`FileSystem`]
//! (blocking) or [`AsyncFileSystem`] (boxed futures), so tests can run them
//! against [`InMemoryFileSystem`] and fault-injecting decorators instead of the
//! disk.
//!
//! ```ignore
//! use folio_core::fs::{InMemoryFileSystem, SyncToAsyncFs};
//! use folio_core::store::FileBackend;
//!
//! let fs = SyncToAsyncFs::new(InMemoryFileSystem::new());
//! let backend = FileBackend::new(fs, "data");
//! ```

mod async_fs;
mod memory;
mod native;

pub use async_fs::{AsyncFileSystem, BoxFuture, SyncToAsyncFs};

#[cfg(test)]
pub(crate) use async_fs::block_on_test;
pub use memory::InMemoryFileSystem;
pub use native::RealFileSystem;

use std::io::Result;
use std::path::{Path, PathBuf};

/// Blocking filesystem operations used by record storage and config.
///
/// `Send + Sync` because one backend is shared by every task using a store.
pub trait FileSystem: Send + Sync {
    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create or truncate a file and write `content`.
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Remove a file. Missing files fail with `NotFound`.
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Create a directory and its missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// True if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Direct entries of `dir`, files and directories alike.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}
