//! Local-filesystem `FileStorage`.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{temp_path, validate_key, FileStorage};
use crate::error::StorageError;

/// Segment files stored directly under `root`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn create_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(self.root.display().to_string(), e))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let final_path = self.path_for(key)?;
        let tmp = temp_path(&final_path);
        if let Err(e) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::io(key, e));
        }
        tokio::fs::rename(&tmp, &final_path)
            .await
            .map_err(|e| StorageError::io(key, e))
    }

    async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(p) => tokio::fs::try_exists(&p).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut out = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if dir == self.root && e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(out);
                }
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), "skipping unreadable directory: {}", e);
                    continue;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(dir = %dir.display(), "directory scan interrupted: {}", e);
                        break;
                    }
                };
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => pending.push(entry.path()),
                    Ok(ft) if ft.is_file() => out.push(entry.path()),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(path = %entry.path().display(), "skipping entry: {}", e);
                    }
                }
            }
        }
        Ok(out)
    }

    async fn size(&self, path: &Path) -> Result<u64, StorageError> {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| StorageError::io(path.display().to_string(), e))
    }

    async fn read_at(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| StorageError::io(key, e))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        Ok(buf)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        let root = self.root.display().to_string();
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(root, e)),
        }
        self.create_root().await
    }
}
