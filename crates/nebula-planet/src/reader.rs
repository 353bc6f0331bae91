//! Reading planet documents from storage.

use std::io;
use std::path::{Path, PathBuf};

/// Source of planet document text.
pub trait FileReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads from the local filesystem, resolving relative paths against an
/// optional root directory.
#[derive(Debug, Clone, Default)]
pub struct FsReader {
    root: Option<PathBuf>,
}

impl FsReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Path that [`FileReader::read_to_string`] will actually open.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl FileReader for FsReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }
}
