//! Consumer side of a scheduler.

use crate::error::FetchError;

/// Receives the lifecycle of every operation of one scheduler.
///
/// The scheduler moves its listener into a single dispatcher task, so the
/// methods are never called concurrently, even though operations run in
/// parallel. Within one operation the order is `will_begin_request`, then
/// `did_receive` in offset order, then exactly one `did_finish_request`.
pub trait SchedulerListener<R>: Send + 'static {
    fn will_begin_request(&mut self, request: &R);

    /// Total resource length reported by the fetcher, when known.
    fn did_receive_content_length(&mut self, _length: u64, _request: &R) {}

    fn did_receive(&mut self, data: &[u8], request: &R);

    /// `error` is `None` on success.
    fn did_finish_request(&mut self, request: &R, error: Option<&FetchError>);
}
