//! One range fetch running as its own task.

use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::fetcher::{FetchEvent, FetchRequest, SegmentFetcher};

/// Handle returned by `RequestScheduler::append`; unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub(super) u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

pub(super) enum OpEvent {
    Begin,
    ContentLength(u64),
    Data(Vec<u8>),
    Finish(Option<FetchError>),
}

/// Event tagged with the operation that produced it, sent to the dispatcher.
pub(super) struct Envelope {
    pub(super) id: OperationId,
    pub(super) event: OpEvent,
}

pub(super) struct FetchOperation {
    pub(super) id: OperationId,
    pub(super) request: FetchRequest,
    pub(super) cancel: CancellationToken,
    pub(super) permits: Option<Arc<Semaphore>>,
    pub(super) fetcher: Arc<dyn SegmentFetcher>,
    pub(super) events: mpsc::UnboundedSender<Envelope>,
}

impl FetchOperation {
    /// Run to a terminal state and report it. Always sends exactly one `Finish`.
    pub(super) async fn run(self) {
        let error = self.execute().await.err();
        match &error {
            None => tracing::debug!(op = %self.id, "fetch operation completed"),
            Some(e) if e.is_cancelled() => tracing::debug!(op = %self.id, "fetch operation cancelled"),
            Some(e) => tracing::warn!(op = %self.id, range = ?self.request.range, "fetch operation failed: {}", e),
        }
        self.emit(OpEvent::Finish(error));
    }

    async fn execute(&self) -> Result<(), FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        // Held until the fetch stream is done or dropped.
        let _permit = match &self.permits {
            Some(sem) => {
                let sem = Arc::clone(sem);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                    permit = sem.acquire_owned() => {
                        Some(permit.map_err(|_| FetchError::Cancelled)?)
                    }
                }
            }
            None => None,
        };

        self.emit(OpEvent::Begin);
        let mut stream = self.fetcher.fetch(self.request.clone());
        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                item = stream.next() => item,
            };
            match item {
                Some(Ok(FetchEvent::ContentLength(len))) => self.emit(OpEvent::ContentLength(len)),
                Some(Ok(FetchEvent::Data(bytes))) => {
                    if !bytes.is_empty() {
                        self.emit(OpEvent::Data(bytes));
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }

    fn emit(&self, event: OpEvent) {
        // The dispatcher only goes away with the scheduler, which cancels us first.
        let _ = self.events.send(Envelope { id: self.id, event });
    }
}
