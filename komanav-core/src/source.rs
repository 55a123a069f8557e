//! Where panel metadata files come from.
//!
//! The index never touches the filesystem directly; it asks a
//! [`MetadataSource`] whether a candidate exists and for its contents.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Existence checks and reads for metadata files.
pub trait MetadataSource {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads metadata from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl MetadataSource for FsSource {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory metadata files, keyed by path. Counts reads so callers can
/// verify caching behaviour.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, String>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Number of successful reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl MetadataSource for MemorySource {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let contents = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(contents)
    }
}
