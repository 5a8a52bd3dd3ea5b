//! In-memory filesystem implementation.

use std::collections::{HashMap, HashSet};
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use super::FileSystem;

#[derive(Default)]
struct State {
    files: HashMap<PathBuf, String>,
    dirs: HashSet<PathBuf>,
}

/// A filesystem held entirely in memory.
///
/// Clones share the same storage, so a test can keep a handle while a backend
/// owns another.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    state: Arc<RwLock<State>>,
}

impl InMemoryFileSystem {
    /// Create a new empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// All file paths currently stored.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.files.keys().cloned().collect()
    }

    fn register_parents(state: &mut State, path: &Path) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.files.get(path).cloned().ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path))
        })
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.dirs.contains(path) {
            return Err(Error::new(
                ErrorKind::IsADirectory,
                format!("Path is a directory: {:?}", path),
            ));
        }
        Self::register_parents(&mut state, path);
        state.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.files.contains_key(path) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("A file exists at {:?}", path),
            ));
        }
        Self::register_parents(&mut state, path);
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.dirs.contains(path)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let is_child = |p: &&PathBuf| p.parent() == Some(dir);
        let mut entries: Vec<PathBuf> = state
            .files
            .keys()
            .filter(is_child)
            .chain(state.dirs.iter().filter(is_child))
            .cloned()
            .collect();
        entries.sort();
        Ok(entries)
    }
}
