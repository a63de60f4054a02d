//! Segment read operations: per-resource listing, declared length, totals.

use anyhow::Result;
use sqlx::Row;

use super::super::db::SegmentDb;
use super::super::types::Segment;
use super::segment_from_row;

impl SegmentDb {
    /// All segments of `resource_id`, ordered by start offset ascending.
    pub async fn list_segments(&self, resource_id: &str) -> Result<Vec<Segment>> {
        let rows = sqlx::query(
            r#"
            SELECT resource_id, start_offset, length, storage_key, updated_at
            FROM segments
            WHERE resource_id = ?1
            ORDER BY start_offset ASC
            "#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(segment_from_row).collect())
    }

    /// Single segment by key, if present.
    pub async fn get_segment(&self, resource_id: &str, start_offset: u64) -> Result<Option<Segment>> {
        let row = sqlx::query(
            r#"
            SELECT resource_id, start_offset, length, storage_key, updated_at
            FROM segments
            WHERE resource_id = ?1 AND start_offset = ?2
            "#,
        )
        .bind(resource_id)
        .bind(start_offset as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(segment_from_row))
    }

    pub async fn get_declared_length(&self, resource_id: &str) -> Result<Option<u64>> {
        let row = sqlx::query(
            r#"
            SELECT declared_length FROM resources
            WHERE resource_id = ?1
            "#,
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let len: i64 = r.get("declared_length");
            len.max(0) as u64
        }))
    }

    /// Number of segment rows across all resources.
    pub async fn segment_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM segments")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
