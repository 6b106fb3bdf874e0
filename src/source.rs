//! Content fetch capability used by the change tracker.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("content of {path} is not available: {reason}")]
    NotAvailable { path: PathBuf, reason: String },
}

impl FetchError {
    pub fn not_available(path: &Path, reason: impl Into<String>) -> Self {
        Self::NotAvailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Supplies the full byte content of a path at the moment it is asked
pub trait ContentSource {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>, FetchError>;
}

/// Reads content straight from disk
#[derive(Debug, Clone)]
pub struct FsContentSource {
    max_file_bytes: u64,
}

impl FsContentSource {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

impl ContentSource for FsContentSource {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        let metadata =
            std::fs::metadata(path).map_err(|err| FetchError::not_available(path, err.to_string()))?;
        if !metadata.is_file() {
            return Err(FetchError::not_available(path, "not a regular file"));
        }
        if metadata.len() > self.max_file_bytes {
            return Err(FetchError::not_available(
                path,
                format!("{} bytes exceeds the {} byte limit", metadata.len(), self.max_file_bytes),
            ));
        }
        std::fs::read(path).map_err(|err| FetchError::not_available(path, err.to_string()))
    }
}

/// Fixed in-memory contents keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    contents: HashMap<PathBuf, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.contents.insert(path.into(), content.into());
    }

    pub fn with(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Read every path from `source`, keeping only the ones that succeed
    pub fn capture<'a, S, I>(source: &S, paths: I) -> Self
    where
        S: ContentSource + ?Sized,
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut captured = Self::new();
        for path in paths {
            match source.fetch(path) {
                Ok(content) => captured.insert(path.clone(), content),
                Err(err) => tracing::debug!("{}", err),
            }
        }
        captured
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.contents.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.contents.contains_key(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn into_inner(self) -> HashMap<PathBuf, Vec<u8>> {
        self.contents
    }
}

impl ContentSource for MemorySource {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::not_available(path, "no content captured"))
    }
}

/// Last seen content of watched files, used as the "before" side of a batch
pub struct SnapshotStore {
    cache: LruCache<PathBuf, Vec<u8>>,
}

impl SnapshotStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LruCache::new(capacity),
        }
    }

    pub fn update(&mut self, path: PathBuf, content: Vec<u8>) {
        self.cache.put(path, content);
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.cache.pop(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cache.contains(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

impl ContentSource for SnapshotStore {
    fn fetch(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        self.cache
            .peek(path)
            .cloned()
            .ok_or_else(|| FetchError::not_available(path, "no previous snapshot"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_source_reads_files() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("main.rs");
        std::fs::write(&file, "fn main() {}").unwrap();

        let source = FsContentSource::new(1024);
        assert_eq!(source.fetch(&file).unwrap(), b"fn main() {}");
    }

    #[test]
    fn test_fs_source_failures() {
        let temp_dir = TempDir::new().unwrap();
        let source = FsContentSource::new(4);

        let missing = temp_dir.path().join("missing.rs");
        assert!(matches!(source.fetch(&missing), Err(FetchError::NotAvailable { .. })));
        assert!(source.fetch(temp_dir.path()).is_err());

        let large = temp_dir.path().join("large.txt");
        std::fs::write(&large, "more than four bytes").unwrap();
        let err = source.fetch(&large).unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[test]
    fn test_memory_source_capture() {
        let source = MemorySource::new().with("a.rs", "a").with("b.rs", "b");
        let paths = vec![PathBuf::from("a.rs"), PathBuf::from("c.rs")];

        let captured = MemorySource::capture(&source, &paths);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured.get(Path::new("a.rs")), Some(&b"a"[..]));
        assert!(!captured.contains(Path::new("c.rs")));
    }

    #[test]
    fn test_snapshot_store_is_bounded() {
        let mut store = SnapshotStore::new(NonZeroUsize::new(2).unwrap());
        store.update(PathBuf::from("a"), b"1".to_vec());
        store.update(PathBuf::from("b"), b"2".to_vec());
        store.update(PathBuf::from("c"), b"3".to_vec());

        assert_eq!(store.len(), 2);
        assert!(store.fetch(Path::new("a")).is_err());
        assert_eq!(store.fetch(Path::new("c")).unwrap(), b"3");

        assert!(store.remove(Path::new("c")).is_some());
        assert!(!store.contains(Path::new("c")));
    }
}
