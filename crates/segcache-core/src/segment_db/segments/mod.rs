//! Segment CRUD on `SegmentDb`, plus its `SegmentStore` impl.

mod read;
mod write;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::SegmentDb;
use super::store::SegmentStore;
use super::types::Segment;

fn segment_from_row(row: &SqliteRow) -> Segment {
    let start_offset: i64 = row.get("start_offset");
    let length: i64 = row.get("length");
    Segment {
        resource_id: row.get("resource_id"),
        start_offset: start_offset.max(0) as u64,
        length: length.max(0) as u64,
        storage_key: row.get("storage_key"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl SegmentStore for SegmentDb {
    async fn upsert(&self, segment: &Segment) -> Result<()> {
        self.upsert_segment(segment).await
    }

    async fn segments_for(&self, resource_id: &str) -> Result<Vec<Segment>> {
        self.list_segments(resource_id).await
    }

    async fn delete_all(&self, resource_id: &str) -> Result<Vec<Segment>> {
        self.remove_segments(resource_id).await
    }

    async fn delete_oldest(&self, limit: usize) -> Result<Vec<Segment>> {
        self.remove_oldest(limit).await
    }

    async fn declared_length(&self, resource_id: &str) -> Result<Option<u64>> {
        self.get_declared_length(resource_id).await
    }

    async fn set_declared_length(&self, resource_id: &str, length: u64) -> Result<()> {
        self.put_declared_length(resource_id, length).await
    }

    async fn delete_everything(&self) -> Result<()> {
        self.clear().await
    }
}
