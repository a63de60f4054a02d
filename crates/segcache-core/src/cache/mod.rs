//! Cache manager: owns the size budget and ties segment metadata, segment
//! files and coverage math together.
//!
//! One `CacheManager` is constructed per process and cloned into every
//! consumer; clones share the same store, storage root, budget and trim
//! worker.

mod trim;


pub use trim::TrimReport;

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{CacheConfig, DEFAULT_MAX_CACHE_SIZE_MB};
use crate::coverage::{self, CachedPiece};
use crate::error::StorageError;
use crate::segment_db::{Segment, SegmentDb, SegmentStore};
use crate::storage::{FileStorage, LocalFileStorage};

/// Bytes per unit of the cache budget when comparing against the scanned total.
pub const MIB: u64 = 1024 * 1024;

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn SegmentStore>,
    pub(crate) storage: Arc<dyn FileStorage>,
    max_cache_size_mb: AtomicU64,
    /// Serializes trim passes (background worker and direct callers).
    trim_lock: tokio::sync::Mutex<()>,
    /// Saves hold it shared across file write and row upsert; eviction and
    /// deletion hold it exclusively across row delete and file removal, so a
    /// row never outlives its file.
    segment_lock: tokio::sync::RwLock<()>,
    /// Completed trim passes since construction.
    trim_passes: AtomicU64,
}

/// Handle to the shared segment cache.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
    trim_tx: mpsc::Sender<()>,
}

impl CacheManager {
    /// Build a manager over the given store and storage, with the default budget.
    ///
    /// Spawns the background trim worker, so this must run inside a Tokio
    /// runtime. The worker exits once every clone of the manager is dropped.
    pub fn new(store: Arc<dyn SegmentStore>, storage: Arc<dyn FileStorage>) -> Self {
        let inner = Arc::new(Inner {
            store,
            storage,
            max_cache_size_mb: AtomicU64::new(DEFAULT_MAX_CACHE_SIZE_MB),
            trim_lock: tokio::sync::Mutex::new(()),
            segment_lock: tokio::sync::RwLock::new(()),
            trim_passes: AtomicU64::new(0),
        });
        let (trim_tx, trim_rx) = mpsc::channel(1);
        tokio::spawn(trim::run_trim_worker(Arc::clone(&inner), trim_rx));
        CacheManager { inner, trim_tx }
    }

    /// Open the default SQLite store and the configured cache directory, apply
    /// the configured budget and queue an initial trim pass.
    pub async fn open(cfg: &CacheConfig) -> Result<Self> {
        let db = SegmentDb::open_default().await?;
        let storage = LocalFileStorage::new(cfg.resolved_cache_dir()?);
        let cache = CacheManager::new(Arc::new(db), Arc::new(storage));
        cache.configure(cfg.max_cache_size_mb).await;
        cache.request_trim();
        Ok(cache)
    }

    /// Set the budget (whole megabytes) and make sure the storage root exists.
    /// A failure to create the root is logged; saves will then fail and be logged too.
    pub async fn configure(&self, max_cache_size_mb: u64) {
        self.inner
            .max_cache_size_mb
            .store(max_cache_size_mb, Ordering::Relaxed);
        if let Err(e) = self.inner.storage.create_root().await {
            tracing::warn!(
                root = %self.inner.storage.root().display(),
                "could not create cache directory: {}",
                e
            );
        }
    }

    pub fn max_cache_size_mb(&self) -> u64 {
        self.inner.max_cache_size_mb.load(Ordering::Relaxed)
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.inner.storage
    }

    /// Persist `data` as the segment of `resource_id` starting at `start_offset`.
    ///
    /// Returns `Ok(false)` if the file write failed (logged, no metadata row
    /// written) and `Err` only when the metadata store fails. A trim check is
    /// requested afterwards in every case.
    pub async fn save(&self, resource_id: &str, data: &[u8], start_offset: u64) -> Result<bool> {
        let result = self.persist(resource_id, data, start_offset).await;
        self.request_trim();
        result
    }

    async fn persist(&self, resource_id: &str, data: &[u8], start_offset: u64) -> Result<bool> {
        if data.is_empty() {
            tracing::debug!(resource_id, start_offset, "ignoring empty segment");
            return Ok(false);
        }
        let segment = Segment::new(resource_id, start_offset, data.len() as u64);
        let _shared = self.inner.segment_lock.read().await;
        if let Err(e) = self.inner.storage.write(&segment.storage_key, data).await {
            tracing::warn!(key = %segment.storage_key, "segment write failed: {}", e);
            return Ok(false);
        }
        self.inner.store.upsert(&segment).await?;
        tracing::debug!(
            key = %segment.storage_key,
            length = segment.length,
            "saved segment"
        );
        Ok(true)
    }

    /// Remove every segment (rows and files) of `resource_id`.
    /// The learned declared length is kept.
    pub async fn delete(&self, resource_id: &str) -> Result<()> {
        let _exclusive = self.inner.segment_lock.write().await;
        let removed = self.inner.store.delete_all(resource_id).await?;
        for segment in &removed {
            self.remove_file(segment).await;
        }
        tracing::debug!(resource_id, segments = removed.len(), "deleted resource");
        Ok(())
    }

    /// Remove every row and every file under the storage root.
    pub async fn clean_all(&self) -> Result<()> {
        let _exclusive = self.inner.segment_lock.write().await;
        self.inner.store.delete_everything().await?;
        self.inner.storage.remove_all().await?;
        tracing::info!("cache cleaned");
        Ok(())
    }

    /// True when the stored segments of `resource_id` cover its whole declared length.
    pub async fn is_fully_cached(&self, resource_id: &str) -> Result<bool> {
        let declared = self.inner.store.declared_length(resource_id).await?;
        let Some(declared) = declared.filter(|len| *len > 0) else {
            tracing::debug!(resource_id, "is_fully_cached: no declared length");
            return Ok(false);
        };
        let segments = self.inner.store.segments_for(resource_id).await?;
        let fully = coverage::is_fully_covered(&segments, declared);
        tracing::debug!(resource_id, fully, "is_fully_cached");
        Ok(fully)
    }

    /// Segments of `resource_id`, ordered by start offset.
    pub async fn segments(&self, resource_id: &str) -> Result<Vec<Segment>> {
        self.inner.store.segments_for(resource_id).await
    }

    /// True if at least one segment of `resource_id` is stored.
    pub async fn data_exists(&self, resource_id: &str) -> Result<bool> {
        Ok(!self.segments(resource_id).await?.is_empty())
    }

    pub async fn declared_length(&self, resource_id: &str) -> Result<Option<u64>> {
        self.inner.store.declared_length(resource_id).await
    }

    pub async fn set_declared_length(&self, resource_id: &str, length: u64) -> Result<()> {
        self.inner.store.set_declared_length(resource_id, length).await
    }

    /// Read the bytes of a cached piece back from its segment file.
    pub async fn read_piece(&self, piece: &CachedPiece) -> Result<Vec<u8>, StorageError> {
        self.inner
            .storage
            .read_at(&piece.segment.storage_key, piece.local_offset, piece.len)
            .await
    }

    /// Ask the background worker for a trim pass. Never blocks; a request
    /// made while another is already pending is dropped.
    pub fn request_trim(&self) {
        if self.trim_tx.try_send(()).is_err() {
            tracing::trace!("trim already pending");
        }
    }

    /// Run a trim pass now, serialized with the background worker.
    pub async fn trim(&self) -> Result<TrimReport> {
        trim::trim(&self.inner).await
    }

    /// Total size in bytes of all files under the storage root (snapshot scan).
    pub async fn total_cache_size(&self) -> u64 {
        trim::total_cache_size(self.inner.storage.as_ref()).await
    }

    #[cfg(test)]
    pub(crate) fn trim_passes(&self) -> u64 {
        self.inner.trim_passes.load(Ordering::SeqCst)
    }

    async fn remove_file(&self, segment: &Segment) {
        if let Err(e) = self.inner.storage.remove(&segment.storage_key).await {
            tracing::warn!(key = %segment.storage_key, "could not delete segment file: {}", e);
        }
    }
}

impl Inner {
    pub(crate) fn max_cache_size_mb(&self) -> u64 {
        self.max_cache_size_mb.load(Ordering::Relaxed)
    }

    pub(crate) fn count_trim_pass(&self) {
        self.trim_passes.fetch_add(1, Ordering::SeqCst);
    }
}
