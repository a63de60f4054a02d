//! SQLite-backed segment database implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Segment CRUD lives in `segments`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed segment database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/segcache/segments.db` on Debian.
#[derive(Clone)]
pub struct SegmentDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl SegmentDb {
    /// Open (or create) the default segment database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("segcache")?;
        let db_path = xdg_dirs.place_state_file("segments.db")?;
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let db = SegmentDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open a private in-memory database (single connection, so every query sees the same DB).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = SegmentDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // - `segments` has one row per cached file; (resource_id, start_offset)
        //   is the upsert key, mirroring the `<id>_<offset>` file name.
        // - `resources` holds the declared content length once known.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS segments (
                resource_id TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                length INTEGER NOT NULL,
                storage_key TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (resource_id, start_offset)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS segments_updated_at
            ON segments (updated_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                resource_id TEXT PRIMARY KEY,
                declared_length INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix milliseconds (for DB timestamps).
pub(crate) fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
