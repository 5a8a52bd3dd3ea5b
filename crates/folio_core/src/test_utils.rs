//! Test utilities for folio_core
//!
//! Filesystem decorators that inject failures, suspension points and torn
//! writes, used to exercise rollback, per-document write serialization and
//! read isolation.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_lite::future::yield_now;

use crate::fs::{AsyncFileSystem, BoxFuture, InMemoryFileSystem, SyncToAsyncFs};

/// Async in-memory filesystem used by most store tests.
pub type MemoryFs = SyncToAsyncFs<InMemoryFileSystem>;

/// Fresh async in-memory filesystem.
pub fn memory_fs() -> MemoryFs {
    SyncToAsyncFs::new(InMemoryFileSystem::new())
}

/// Filesystem whose writes fail while the switch is on.
///
/// Clones share the switch.
#[derive(Clone)]
pub struct FailingFs<F> {
    inner: F,
    fail_writes: Arc<AtomicBool>,
}

impl<F: AsyncFileSystem> FailingFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<F: AsyncFileSystem> AsyncFileSystem for FailingFs<F> {
    fn read_to_string<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        self.inner.read_to_string(path)
    }

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> BoxFuture<'a, io::Result<()>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Box::pin(async { Err(io::Error::other("injected write failure")) });
        }
        self.inner.write_file(path, content)
    }

    fn delete_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.delete_file(path)
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn is_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        self.inner.is_dir(path)
    }

    fn list_files<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>> {
        self.inner.list_files(dir)
    }
}

/// Filesystem that suspends before every read and write, so concurrent
/// operations interleave at their storage I/O.
///
/// Clones share the write counter.
#[derive(Clone)]
pub struct YieldingFs<F> {
    inner: F,
    writes: Arc<AtomicUsize>,
}

impl<F: AsyncFileSystem> YieldingFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of completed writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<F: AsyncFileSystem> AsyncFileSystem for YieldingFs<F> {
    fn read_to_string<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        Box::pin(async move {
            yield_now().await;
            self.inner.read_to_string(path).await
        })
    }

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            yield_now().await;
            yield_now().await;
            self.inner.write_file(path, content).await?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn delete_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.delete_file(path)
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn is_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        self.inner.is_dir(path)
    }

    fn list_files<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>> {
        self.inner.list_files(dir)
    }
}

/// Filesystem whose writes first truncate the file and suspend before writing
/// the content, like a non-atomic `fs::write`. A read in between sees an
/// empty file.
#[derive(Clone)]
pub struct TruncatingFs<F> {
    inner: F,
}

impl<F: AsyncFileSystem> TruncatingFs<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: AsyncFileSystem> AsyncFileSystem for TruncatingFs<F> {
    fn read_to_string<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<String>> {
        self.inner.read_to_string(path)
    }

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a str) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            self.inner.write_file(path, "").await?;
            yield_now().await;
            yield_now().await;
            self.inner.write_file(path, content).await
        })
    }

    fn delete_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.delete_file(path)
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn is_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        self.inner.is_dir(path)
    }

    fn list_files<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>> {
        self.inner.list_files(dir)
    }
}
