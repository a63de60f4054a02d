//! Segment write operations: upsert, per-resource delete, LRU eviction.

use anyhow::Result;
use sqlx::Row;

use super::super::db::{unix_timestamp_millis, SegmentDb};
use super::super::types::Segment;
use super::segment_from_row;

impl SegmentDb {
    /// Insert or overwrite the row for `(resource_id, start_offset)`.
    ///
    /// `updated_at` is the wall clock in milliseconds, bumped past the newest
    /// existing row so eviction order stays strict even within one millisecond.
    pub async fn upsert_segment(&self, segment: &Segment) -> Result<()> {
        let now = unix_timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO segments (
                resource_id, start_offset, length, storage_key, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                MAX(?5, (SELECT COALESCE(MAX(updated_at), 0) + 1 FROM segments))
            )
            ON CONFLICT (resource_id, start_offset) DO UPDATE
            SET length = excluded.length,
                storage_key = excluded.storage_key,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&segment.resource_id)
        .bind(segment.start_offset as i64)
        .bind(segment.length as i64)
        .bind(&segment.storage_key)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete every segment row of `resource_id` and return the deleted rows.
    ///
    /// File cleanup is handled by the caller.
    pub async fn remove_segments(&self, resource_id: &str) -> Result<Vec<Segment>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            r#"
            SELECT resource_id, start_offset, length, storage_key, updated_at
            FROM segments
            WHERE resource_id = ?1
            ORDER BY start_offset ASC
            "#,
        )
        .bind(resource_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM segments
            WHERE resource_id = ?1
            "#,
        )
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(rows.iter().map(segment_from_row).collect())
    }

    /// Delete up to `limit` least-recently-updated segments across all resources.
    /// Returns the deleted rows, oldest first.
    pub async fn remove_oldest(&self, limit: usize) -> Result<Vec<Segment>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            r#"
            SELECT rowid, resource_id, start_offset, length, storage_key, updated_at
            FROM segments
            ORDER BY updated_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;

        for row in &rows {
            let rowid: i64 = row.get("rowid");
            sqlx::query("DELETE FROM segments WHERE rowid = ?1")
                .bind(rowid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(rows.iter().map(segment_from_row).collect())
    }

    /// Record the declared content length of `resource_id`.
    pub async fn put_declared_length(&self, resource_id: &str, length: u64) -> Result<()> {
        let now = unix_timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO resources (resource_id, declared_length, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (resource_id) DO UPDATE
            SET declared_length = excluded.declared_length,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(resource_id)
        .bind(length as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove all segment rows and declared lengths.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM segments").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM resources").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
