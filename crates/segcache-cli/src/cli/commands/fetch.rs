//! `segcache fetch <url> --id <id>` – pull a byte range through the cache.

use anyhow::{bail, Result};
use segcache_core::cache::CacheManager;
use segcache_core::config::CacheConfig;
use segcache_core::error::FetchError;
use segcache_core::fetcher::{CachingFetcher, HttpFetcher, OPEN_END};
use segcache_core::scheduler::{RequestScheduler, SchedulerListener};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

use super::mib;

const PROGRESS_INTERVAL_MS: u128 = 500;

#[derive(Debug)]
pub struct FetchArgs {
    pub url: String,
    pub id: String,
    pub start: u64,
    pub end: Option<u64>,
    /// Raw `Name: value` header arguments.
    pub headers: Vec<String>,
}

/// Split `Name: value` header arguments into a map.
pub fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();
    for h in raw {
        let Some((name, value)) = h.split_once(':') else {
            bail!("invalid header {:?}: expected `Name: value`", h);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid header {:?}: empty name", h);
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

/// Prints progress of the single fetch and hands its outcome back to the command.
struct ProgressListener {
    started: Instant,
    last_print: Instant,
    received: u64,
    total: Option<u64>,
    done: Option<oneshot::Sender<Option<String>>>,
}

impl ProgressListener {
    fn print(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.received as f64 / elapsed
        } else {
            0.0
        };
        let total = self.total.map(mib).unwrap_or_else(|| "?".to_string());
        println!(
            "  {} / {}  {:.2} MiB/s",
            mib(self.received),
            total,
            rate / 1_048_576.0
        );
    }
}

impl SchedulerListener<u64> for ProgressListener {
    fn will_begin_request(&mut self, start: &u64) {
        tracing::info!(start, "fetch started");
    }

    fn did_receive_content_length(&mut self, length: u64, _start: &u64) {
        self.total = Some(length);
    }

    fn did_receive(&mut self, data: &[u8], _start: &u64) {
        self.received += data.len() as u64;
        if self.last_print.elapsed().as_millis() >= PROGRESS_INTERVAL_MS {
            self.print();
            self.last_print = Instant::now();
        }
    }

    fn did_finish_request(&mut self, _start: &u64, error: Option<&FetchError>) {
        self.print();
        if let Some(tx) = self.done.take() {
            let _ = tx.send(error.map(|e| e.to_string()));
        }
    }
}

pub async fn run_fetch(cache: &CacheManager, cfg: &CacheConfig, args: FetchArgs) -> Result<()> {
    let end = args.end.unwrap_or(OPEN_END);
    if args.start >= end {
        bail!("empty range: start {} is not before end {}", args.start, end);
    }

    let http = HttpFetcher::new(cfg.http.clone()).with_headers(parse_headers(&args.headers)?);
    let fetcher = CachingFetcher::new(http, cache.clone());
    let (done_tx, done_rx) = oneshot::channel();
    let now = Instant::now();
    let listener = ProgressListener {
        started: now,
        last_print: now,
        received: 0,
        total: None,
        done: Some(done_tx),
    };
    let scheduler = RequestScheduler::new(
        args.id.clone(),
        args.url.clone(),
        Arc::new(fetcher),
        cfg.max_concurrent_fetches,
        listener,
    );
    scheduler.append(args.start..end, args.start);

    match done_rx.await {
        Ok(None) => {}
        Ok(Some(err)) => bail!("fetch of {} failed: {}", args.url, err),
        Err(_) => bail!("fetch of {} ended without a result", args.url),
    }

    let id = scheduler.resource_id();
    let fully = cache.is_fully_cached(id).await?;
    println!(
        "{}: {}; cache holds {}",
        id,
        if fully { "fully cached" } else { "partially cached" },
        mib(cache.total_cache_size().await)
    );
    Ok(())
}
