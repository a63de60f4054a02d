//! Disk I/O for segment files.
//!
//! Segment bytes live in flat files under one storage root, named by their
//! storage key. Writes go to a `.part` file first and are renamed into place,
//! so a concurrent size scan or read never sees a half-written segment.

mod local;

pub use local::LocalFileStorage;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `movie_0` → `movie_0.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Reject keys that would resolve outside the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// File primitives the cache needs. Must stay safe while a scan runs
/// concurrently with writes.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Directory holding every segment file.
    fn root(&self) -> &Path;

    /// Create the root directory (and parents) if missing.
    async fn create_root(&self) -> Result<(), StorageError>;

    /// Write `data` as the whole content of `key`, replacing any previous file.
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> bool;

    /// Every regular file under the root, recursively. Unreadable directories are skipped.
    async fn list_files(&self) -> Result<Vec<PathBuf>, StorageError>;

    /// Size in bytes of a file returned by `list_files`.
    async fn size(&self, path: &Path) -> Result<u64, StorageError>;

    /// Read `len` bytes of `key` starting at `offset`.
    async fn read_at(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StorageError>;

    /// Remove one file; a missing file is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove everything under the root, keeping the root itself.
    async fn remove_all(&self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("movie1_0"));
        assert_eq!(p.to_string_lossy(), "movie1_0.part");
        let p2 = temp_path(Path::new("/tmp/cache/a_100"));
        assert_eq!(p2.to_string_lossy(), "/tmp/cache/a_100.part");
    }

    #[test]
    fn keys_cannot_escape_root() {
        assert!(validate_key("movie1_0").is_ok());
        assert!(validate_key("..").is_err());
        assert!(validate_key("a/b_0").is_err());
        assert!(validate_key("").is_err());
    }
}
