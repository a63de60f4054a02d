//! Storage-agnostic interface to segment metadata.

use anyhow::Result;
use async_trait::async_trait;

use super::types::Segment;

/// Persistent metadata about cached segments.
///
/// Shared by every resource in the process; implementations must tolerate
/// concurrent upsert, read and delete. Errors are returned to the caller and
/// never retried here.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Insert or replace the row for `(resource_id, start_offset)` and stamp it as most recent.
    async fn upsert(&self, segment: &Segment) -> Result<()>;

    /// All segments of a resource, ordered by start offset ascending.
    async fn segments_for(&self, resource_id: &str) -> Result<Vec<Segment>>;

    /// Remove every segment row of a resource; returns the removed rows.
    async fn delete_all(&self, resource_id: &str) -> Result<Vec<Segment>>;

    /// Remove up to `limit` least-recently-updated segments across all resources.
    async fn delete_oldest(&self, limit: usize) -> Result<Vec<Segment>>;

    /// Declared content length of a resource, if learned.
    async fn declared_length(&self, resource_id: &str) -> Result<Option<u64>>;

    async fn set_declared_length(&self, resource_id: &str, length: u64) -> Result<()>;

    /// Remove all segment rows and declared lengths.
    async fn delete_everything(&self) -> Result<()>;
}
