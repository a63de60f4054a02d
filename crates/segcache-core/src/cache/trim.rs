//! Size-bound eviction and the serialized background trim worker.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::segment_db::Segment;
use crate::storage::FileStorage;

use super::{Inner, MIB};

/// Outcome of one trim pass.
#[derive(Debug, Clone, Default)]
pub struct TrimReport {
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// Evicted segments, oldest first.
    pub evicted: Vec<Segment>,
}

/// Background loop: one trim pass per received request, strictly one at a time.
pub(super) async fn run_trim_worker(inner: Arc<Inner>, mut rx: mpsc::Receiver<()>) {
    while rx.recv().await.is_some() {
        match trim(&inner).await {
            Ok(report) if !report.evicted.is_empty() => tracing::info!(
                evicted = report.evicted.len(),
                bytes_before = report.bytes_before,
                bytes_after = report.bytes_after,
                "cache trimmed"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!("cache trim failed: {:#}", e),
        }
    }
    tracing::debug!("trim worker stopped");
}

/// Evict least-recently-updated segments while the cache is at or over budget.
///
/// The threshold divides the scanned byte total by 1024*1024 and compares the
/// whole-MiB result against the configured megabytes.
pub(super) async fn trim(inner: &Inner) -> Result<TrimReport> {
    let _guard = inner.trim_lock.lock().await;
    let budget_mb = inner.max_cache_size_mb();
    let bytes_before = total_cache_size(inner.storage.as_ref()).await;

    let mut total = bytes_before;
    let mut evicted = Vec::new();
    while total / MIB >= budget_mb {
        // Row delete and file removal happen under one exclusive hold so a
        // concurrent save of the same key lands entirely before or after.
        let _exclusive = inner.segment_lock.write().await;
        let victims = inner.store.delete_oldest(1).await?;
        if victims.is_empty() {
            tracing::debug!(total, "over budget but no segment rows left to evict");
            break;
        }
        for victim in victims {
            let path = inner.storage.root().join(&victim.storage_key);
            let freed = inner
                .storage
                .size(&path)
                .await
                .unwrap_or(victim.length);
            if let Err(e) = inner.storage.remove(&victim.storage_key).await {
                tracing::warn!(key = %victim.storage_key, "could not delete evicted file: {}", e);
            }
            total = total.saturating_sub(freed);
            evicted.push(victim);
        }
    }

    inner.count_trim_pass();
    Ok(TrimReport {
        bytes_before,
        bytes_after: total,
        evicted,
    })
}

/// Sum of file sizes under the storage root. Files that vanish or cannot be
/// read during the scan are skipped.
pub(super) async fn total_cache_size(storage: &dyn FileStorage) -> u64 {
    let files = match storage.list_files().await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!("cache size scan failed: {}", e);
            return 0;
        }
    };
    let mut total = 0u64;
    for file in files {
        match storage.size(&file).await {
            Ok(size) => total += size,
            Err(e) => tracing::debug!(path = %file.display(), "skipping file in size scan: {}", e),
        }
    }
    total
}
