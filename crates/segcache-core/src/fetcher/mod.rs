//! Byte-range fetchers: the seam between a fetch operation and wherever the
//! bytes come from.
//!
//! A fetcher turns one [`FetchRequest`] into a stream of [`FetchEvent`]s.
//! Dropping the stream cancels the fetch.

mod caching;
mod http;

pub use caching::CachingFetcher;
pub use http::{parse_content_range, HttpFetcher};

use futures::stream::BoxStream;
use std::ops::Range;
use tokio::sync::mpsc;

use crate::error::FetchError;

/// Range end meaning "until the end of the resource".
pub const OPEN_END: u64 = u64::MAX;

/// Chunks buffered between a producer task and the consuming operation.
pub(crate) const CHANNEL_DEPTH: usize = 16;

/// One range fetch: which resource, where it lives, and which bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub resource_id: String,
    pub url: String,
    /// Half-open byte range; `end == OPEN_END` reads to the end of the resource.
    pub range: Range<u64>,
}

impl FetchRequest {
    pub fn is_open_ended(&self) -> bool {
        self.range.end == OPEN_END
    }
}

/// Item produced by a fetch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Total length of the resource, as reported by the source.
    ContentLength(u64),
    /// Next bytes of the range, contiguous with the previous `Data`.
    Data(Vec<u8>),
}

pub type FetchStream = BoxStream<'static, Result<FetchEvent, FetchError>>;

/// Produces the bytes of a requested range, from the network and/or disk.
///
/// Retry policy, if any, belongs to the implementation.
pub trait SegmentFetcher: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> FetchStream;
}

/// Stream over items sent by a producer task; ends when the producer drops its sender.
pub(crate) fn channel_stream(rx: mpsc::Receiver<Result<FetchEvent, FetchError>>) -> FetchStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
