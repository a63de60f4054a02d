//! End-to-end: HTTP range fetches through the scheduler into the cache.

mod common;

use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use segcache_core::cache::CacheManager;
use segcache_core::config::HttpConfig;
use segcache_core::error::FetchError;
use segcache_core::fetcher::{CachingFetcher, FetchEvent, FetchRequest, HttpFetcher, SegmentFetcher, OPEN_END};
use segcache_core::scheduler::{RequestScheduler, SchedulerListener};
use segcache_core::segment_db::SegmentDb;
use segcache_core::storage::LocalFileStorage;

use common::range_server::{self, RangeServerOptions};

fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

fn request(url: &str, range: std::ops::Range<u64>) -> FetchRequest {
    FetchRequest {
        resource_id: "media".to_string(),
        url: url.to_string(),
        range,
    }
}

async fn collect(fetcher: &dyn SegmentFetcher, req: FetchRequest) -> Result<(Vec<u8>, Option<u64>), FetchError> {
    let mut stream = fetcher.fetch(req);
    let mut data = Vec::new();
    let mut length = None;
    while let Some(item) = stream.next().await {
        match item? {
            FetchEvent::ContentLength(len) => length = Some(len),
            FetchEvent::Data(bytes) => data.extend(bytes),
        }
    }
    Ok((data, length))
}

async fn open_cache(dir: &std::path::Path) -> CacheManager {
    let db = SegmentDb::open_at(dir.join("segments.db")).await.expect("open db");
    let cache = CacheManager::new(Arc::new(db), Arc::new(LocalFileStorage::new(dir.join("media"))));
    cache.configure(100).await;
    cache
}

#[tokio::test]
async fn http_fetcher_reads_a_range() {
    let data = body(10_000);
    let server = range_server::start(data.clone());
    let fetcher = HttpFetcher::new(HttpConfig::default());

    let (got, length) = collect(&fetcher, request(&server.url, 100..612)).await.expect("fetch");
    assert_eq!(got, data[100..612]);
    assert_eq!(length, Some(10_000));

    let (got, _) = collect(&fetcher, request(&server.url, 9_000..OPEN_END)).await.expect("fetch");
    assert_eq!(got, data[9_000..]);
}

#[tokio::test]
async fn http_fetcher_reports_status_errors() {
    let server = range_server::start_with_options(
        body(100),
        RangeServerOptions {
            fail_status: Some(503),
            ..Default::default()
        },
    );
    let fetcher = HttpFetcher::new(HttpConfig::default());
    let err = collect(&fetcher, request(&server.url, 0..10)).await.unwrap_err();
    assert!(matches!(err, FetchError::Http(503)), "got {:?}", err);
}

#[tokio::test]
async fn http_fetcher_rejects_ignored_range() {
    let server = range_server::start_with_options(
        body(1_000),
        RangeServerOptions {
            ignore_ranges: true,
            ..Default::default()
        },
    );
    let fetcher = HttpFetcher::new(HttpConfig::default());
    let err = collect(&fetcher, request(&server.url, 500..600)).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn http_fetcher_trims_full_body_to_requested_prefix() {
    let data = body(5_000);
    let server = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            ignore_ranges: true,
            ..Default::default()
        },
    );
    let fetcher = HttpFetcher::new(HttpConfig::default());
    let (got, length) = collect(&fetcher, request(&server.url, 0..100)).await.expect("fetch");
    assert_eq!(got, data[..100]);
    assert_eq!(length, Some(5_000));
}

#[tokio::test]
async fn dropping_stream_stops_stalled_transfer() {
    let server = range_server::start_with_options(
        body(1_000),
        RangeServerOptions {
            stall: true,
            ..Default::default()
        },
    );
    let fetcher = HttpFetcher::new(HttpConfig::default());
    let mut stream = fetcher.fetch(request(&server.url, 0..100));
    assert!(tokio::time::timeout(Duration::from_millis(300), stream.next())
        .await
        .is_err());
    drop(stream);

    // Well under the 60 s low-speed limit.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while server.hangups() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "transfer kept running after cancel");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Collects the bytes of each request and signals every terminal callback.
struct Collector {
    data: Arc<Mutex<Vec<u8>>>,
    done: mpsc::UnboundedSender<Option<String>>,
}

impl SchedulerListener<&'static str> for Collector {
    fn will_begin_request(&mut self, _request: &&'static str) {}

    fn did_receive(&mut self, data: &[u8], _request: &&'static str) {
        self.data.lock().unwrap().extend_from_slice(data);
    }

    fn did_finish_request(&mut self, _request: &&'static str, error: Option<&FetchError>) {
        let _ = self.done.send(error.map(|e| e.to_string()));
    }
}

#[tokio::test]
async fn scheduled_fetches_fill_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let data = body(50_000);
    let server = range_server::start(data.clone());
    let cache = open_cache(dir.path()).await;

    let fetcher = CachingFetcher::new(HttpFetcher::new(HttpConfig::default()), cache.clone());
    let received = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let scheduler = RequestScheduler::new(
        "media",
        server.url.clone(),
        Arc::new(fetcher),
        Some(2),
        Collector {
            data: Arc::clone(&received),
            done: done_tx,
        },
    );

    scheduler.append(0..20_000, "head");
    let outcome = tokio::time::timeout(Duration::from_secs(30), done_rx.recv()).await.unwrap();
    assert_eq!(outcome, Some(None));
    assert!(!cache.is_fully_cached("media").await.unwrap());
    assert_eq!(cache.declared_length("media").await.unwrap(), Some(50_000));

    scheduler.append(20_000..OPEN_END, "tail");
    let outcome = tokio::time::timeout(Duration::from_secs(30), done_rx.recv()).await.unwrap();
    assert_eq!(outcome, Some(None));
    assert_eq!(*received.lock().unwrap(), data);
    assert!(cache.is_fully_cached("media").await.unwrap());
    assert_eq!(server.hits(), 2);

    // A re-read is answered from disk.
    received.lock().unwrap().clear();
    scheduler.append(10_000..30_000, "again");
    let outcome = tokio::time::timeout(Duration::from_secs(30), done_rx.recv()).await.unwrap();
    assert_eq!(outcome, Some(None));
    assert_eq!(*received.lock().unwrap(), data[10_000..30_000]);
    assert_eq!(server.hits(), 2);

    cache.delete("media").await.unwrap();
    assert!(!cache.is_fully_cached("media").await.unwrap());
}
