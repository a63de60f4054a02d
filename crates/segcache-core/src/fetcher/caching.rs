//! Fetcher that answers from the segment cache first and saves what it had
//! to fetch.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{channel_stream, FetchEvent, FetchRequest, FetchStream, SegmentFetcher, CHANNEL_DEPTH};
use crate::cache::CacheManager;
use crate::coverage::covered_prefix;
use crate::error::FetchError;

type Sender = mpsc::Sender<Result<FetchEvent, FetchError>>;

/// Serves the cached prefix of a range from disk, fetches the rest through
/// the inner fetcher, and saves the fetched bytes as one segment once the
/// inner fetch succeeds.
pub struct CachingFetcher<F> {
    inner: Arc<F>,
    cache: CacheManager,
}

impl<F: SegmentFetcher> CachingFetcher<F> {
    pub fn new(inner: F, cache: CacheManager) -> Self {
        Self {
            inner: Arc::new(inner),
            cache,
        }
    }
}

impl<F: SegmentFetcher> SegmentFetcher for CachingFetcher<F> {
    fn fetch(&self, request: FetchRequest) -> FetchStream {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let cache = self.cache.clone();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = serve(&cache, inner.as_ref(), request, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });
        channel_stream(rx)
    }
}

fn metadata_error(e: anyhow::Error) -> FetchError {
    FetchError::Transport(format!("segment metadata: {:#}", e))
}

async fn serve<F: SegmentFetcher>(
    cache: &CacheManager,
    inner: &F,
    request: FetchRequest,
    tx: &Sender,
) -> Result<(), FetchError> {
    let resource_id = request.resource_id.clone();
    let mut range = request.range.clone();

    if let Some(len) = cache.declared_length(&resource_id).await.map_err(metadata_error)? {
        range.end = range.end.min(len);
        if tx.send(Ok(FetchEvent::ContentLength(len))).await.is_err() {
            return Ok(());
        }
    }

    let segments = cache.segments(&resource_id).await.map_err(metadata_error)?;
    let mut cursor = range.start;
    for piece in covered_prefix(&segments, range.clone()) {
        match cache.read_piece(&piece).await {
            Ok(bytes) => {
                cursor += bytes.len() as u64;
                if tx.send(Ok(FetchEvent::Data(bytes))).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => {
                // Fall through to the network for the rest of the range.
                tracing::warn!(key = %piece.segment.storage_key, "cached read failed: {}", e);
                break;
            }
        }
    }
    if cursor >= range.end {
        tracing::debug!(resource_id = %resource_id, ?range, "served from cache");
        return Ok(());
    }

    let remainder = FetchRequest {
        range: cursor..range.end,
        ..request
    };
    let mut stream = inner.fetch(remainder);
    let mut fetched = Vec::new();
    loop {
        let item = tokio::select! {
            _ = tx.closed() => return Ok(()),
            item = stream.next() => item,
        };
        match item {
            Some(Ok(FetchEvent::ContentLength(len))) => {
                if let Err(e) = cache.set_declared_length(&resource_id, len).await {
                    tracing::warn!(resource_id = %resource_id, "could not record content length: {:#}", e);
                }
                if tx.send(Ok(FetchEvent::ContentLength(len))).await.is_err() {
                    return Ok(());
                }
            }
            Some(Ok(FetchEvent::Data(bytes))) => {
                fetched.extend_from_slice(&bytes);
                if tx.send(Ok(FetchEvent::Data(bytes))).await.is_err() {
                    return Ok(());
                }
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    if !fetched.is_empty() {
        if let Err(e) = cache.save(&resource_id, &fetched, cursor).await {
            tracing::warn!(resource_id = %resource_id, "could not save fetched segment: {:#}", e);
        }
    }
    Ok(())
}
