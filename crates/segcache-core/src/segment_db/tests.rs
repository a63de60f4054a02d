//! Tests for segment_db (in-memory DB).

use crate::segment_db::{Segment, SegmentDb, SegmentStore};

#[tokio::test]
async fn upsert_then_get_reports_loaded_length() {
    let db = SegmentDb::open_memory().await.unwrap();
    db.upsert(&Segment::new("r", 0, 60)).await.unwrap();

    let seg = db.get_segment("r", 0).await.unwrap().expect("segment exists");
    assert_eq!(seg.length, 60);
    assert_eq!(seg.storage_key, "r_0");
    assert!(seg.updated_at > 0);
}

#[tokio::test]
async fn upsert_same_offset_overwrites() {
    let db = SegmentDb::open_memory().await.unwrap();
    db.upsert(&Segment::new("r", 10, 5)).await.unwrap();
    db.upsert(&Segment::new("r", 10, 50)).await.unwrap();

    let segs = db.segments_for("r").await.unwrap();
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].length, 50);
    assert_eq!(db.segment_count().await.unwrap(), 1);
}

#[tokio::test]
async fn segments_are_ordered_by_start() {
    let db = SegmentDb::open_memory().await.unwrap();
    for start in [200u64, 0, 100] {
        db.upsert(&Segment::new("r", start, 100)).await.unwrap();
    }
    db.upsert(&Segment::new("other", 50, 10)).await.unwrap();

    let starts: Vec<u64> = db
        .segments_for("r")
        .await
        .unwrap()
        .iter()
        .map(|s| s.start_offset)
        .collect();
    assert_eq!(starts, vec![0, 100, 200]);
}

#[tokio::test]
async fn delete_oldest_is_global_lru() {
    let db = SegmentDb::open_memory().await.unwrap();
    db.upsert(&Segment::new("a", 0, 1)).await.unwrap();
    db.upsert(&Segment::new("b", 0, 1)).await.unwrap();
    db.upsert(&Segment::new("a", 1, 1)).await.unwrap();
    // Re-saving a_0 makes it the most recent.
    db.upsert(&Segment::new("a", 0, 1)).await.unwrap();

    let evicted = db.delete_oldest(2).await.unwrap();
    let keys: Vec<&str> = evicted.iter().map(|s| s.storage_key.as_str()).collect();
    assert_eq!(keys, vec!["b_0", "a_1"]);

    let left = db.segments_for("a").await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].storage_key, "a_0");
    assert!(db.delete_oldest(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_all_returns_rows_of_one_resource() {
    let db = SegmentDb::open_memory().await.unwrap();
    db.upsert(&Segment::new("a", 0, 1)).await.unwrap();
    db.upsert(&Segment::new("a", 1, 1)).await.unwrap();
    db.upsert(&Segment::new("b", 0, 1)).await.unwrap();

    let removed = db.delete_all("a").await.unwrap();
    assert_eq!(removed.len(), 2);
    assert!(db.segments_for("a").await.unwrap().is_empty());
    assert_eq!(db.segments_for("b").await.unwrap().len(), 1);
}

#[tokio::test]
async fn declared_length_roundtrip_and_clear() {
    let db = SegmentDb::open_memory().await.unwrap();
    assert_eq!(db.declared_length("movie1").await.unwrap(), None);
    db.set_declared_length("movie1", 100).await.unwrap();
    assert_eq!(db.declared_length("movie1").await.unwrap(), Some(100));
    db.set_declared_length("movie1", 120).await.unwrap();
    assert_eq!(db.declared_length("movie1").await.unwrap(), Some(120));

    db.upsert(&Segment::new("movie1", 0, 10)).await.unwrap();
    db.delete_everything().await.unwrap();
    assert_eq!(db.declared_length("movie1").await.unwrap(), None);
    assert_eq!(db.segment_count().await.unwrap(), 0);
}

#[tokio::test]
async fn open_at_creates_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("segments.db");
    let db = SegmentDb::open_at(&path).await.unwrap();
    db.upsert(&Segment::new("r", 0, 3)).await.unwrap();
    assert!(path.exists());

    let reopened = SegmentDb::open_at(&path).await.unwrap();
    assert_eq!(reopened.segments_for("r").await.unwrap().len(), 1);
}
