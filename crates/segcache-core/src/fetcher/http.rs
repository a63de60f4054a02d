//! HTTP Range GET via curl, streamed chunk by chunk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{channel_stream, FetchEvent, FetchRequest, FetchStream, SegmentFetcher, CHANNEL_DEPTH};
use crate::config::HttpConfig;
use crate::error::FetchError;

type Sender = mpsc::Sender<Result<FetchEvent, FetchError>>;

/// Fetches byte ranges over HTTP(S) with one curl Easy handle per request,
/// run on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    cfg: HttpConfig,
    headers: HashMap<String, String>,
}

impl HttpFetcher {
    pub fn new(cfg: HttpConfig) -> Self {
        Self {
            cfg,
            headers: HashMap::new(),
        }
    }

    /// Extra request headers sent with every fetch.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

impl SegmentFetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> FetchStream {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let cfg = self.cfg.clone();
        let headers = self.headers.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = transfer(&request, &cfg, &headers, &tx) {
                if !e.is_cancelled() {
                    tracing::debug!(url = %request.url, "range fetch failed: {}", e);
                }
                let _ = tx.blocking_send(Err(e));
            }
        });
        channel_stream(rx)
    }
}

/// Value for curl's range option (inclusive end): `start-(end-1)`, or `start-` when open-ended.
fn range_spec(request: &FetchRequest) -> String {
    if request.is_open_ended() {
        format!("{}-", request.range.start)
    } else {
        format!("{}-{}", request.range.start, request.range.end.saturating_sub(1))
    }
}

/// Parses a `Content-Range` header line into `(Some((start, end_inclusive)), total)`.
/// An unsatisfied range (`bytes */1000`) has no start/end; an unknown total (`/*`) is `None`.
pub fn parse_content_range(line: &str) -> Option<(Option<(u64, u64)>, Option<u64>)> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }
    let value = value.trim();
    let spec = value.strip_prefix("bytes")?.trim_start();
    let (range, total) = spec.split_once('/')?;
    let total = total.trim().parse::<u64>().ok();
    let range = match range.trim() {
        "*" => None,
        r => {
            let (a, b) = r.split_once('-')?;
            Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
        }
    };
    Some((range, total))
}

fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Per-response header state; reset on every status line (redirects).
#[derive(Default)]
struct ResponseHead {
    status: u32,
    content_range: Option<(Option<(u64, u64)>, Option<u64>)>,
    content_length: Option<u64>,
}

fn transfer(
    request: &FetchRequest,
    cfg: &HttpConfig,
    headers: &HashMap<String, String>,
    tx: &Sender,
) -> Result<(), FetchError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))?;
    // Prefer low-speed timeout so slow links are not killed by the hard limit.
    easy.low_speed_limit(cfg.low_speed_limit_bytes)?;
    easy.low_speed_time(Duration::from_secs(cfg.low_speed_time_secs))?;
    easy.timeout(Duration::from_secs(cfg.timeout_secs))?;
    if let Some(ua) = &cfg.user_agent {
        easy.useragent(ua)?;
    }
    easy.range(&range_spec(request))?;
    // Progress callbacks keep firing while the server stalls; used to notice a dropped receiver.
    easy.progress(true)?;

    if !headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    let head = RefCell::new(ResponseHead::default());
    let mut length_sent = false;
    let mut received = 0u64;
    let mut receiver_gone = false;
    let mut ignored_range = false;
    // Set when a 200 full-body reply reached the end of a range starting at 0.
    let mut range_complete = false;
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|raw| {
            let line = String::from_utf8_lossy(raw);
            let line = line.trim_end();
            let mut head = head.borrow_mut();
            if let Some(status) = parse_status_line(line) {
                *head = ResponseHead {
                    status,
                    ..ResponseHead::default()
                };
            } else if let Some(cr) = parse_content_range(line) {
                head.content_range = Some(cr);
            } else if let Some(len) = parse_content_length(line) {
                head.content_length = Some(len);
            }
            true
        })?;
        transfer.progress_function(|_, _, _, _| !tx.is_closed())?;
        transfer.write_function(|data| {
            let head = head.borrow();
            if !(200..300).contains(&head.status) {
                // Error body; the status is reported after perform.
                return Ok(data.len());
            }
            if head.status == 200 && request.range.start > 0 {
                ignored_range = true;
                return Ok(0);
            }
            // Full body for a range starting at 0: keep only the requested prefix.
            let mut chunk = data;
            if head.status == 200 && !request.is_open_ended() {
                let remaining = (request.range.end - request.range.start).saturating_sub(received);
                if (chunk.len() as u64) >= remaining {
                    chunk = &data[..remaining as usize];
                    range_complete = true;
                }
            }
            if !length_sent {
                length_sent = true;
                let total = match head.content_range {
                    Some((_, total)) => total,
                    None if head.status == 200 => head.content_length,
                    None => None,
                };
                if let Some(total) = total {
                    if tx.blocking_send(Ok(FetchEvent::ContentLength(total))).is_err() {
                        receiver_gone = true;
                        return Ok(0);
                    }
                }
            }
            if !chunk.is_empty() && tx.blocking_send(Ok(FetchEvent::Data(chunk.to_vec()))).is_err() {
                receiver_gone = true;
                return Ok(0);
            }
            received += chunk.len() as u64;
            if range_complete {
                // Stops the transfer; reported as success below.
                return Ok(0);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    let head = head.into_inner();
    if receiver_gone || tx.is_closed() {
        return Err(FetchError::Cancelled);
    }
    if ignored_range {
        return Err(FetchError::Transport(format!(
            "server ignored range request for {}",
            request.url
        )));
    }
    if range_complete {
        return Ok(());
    }
    perform_result?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    let expected = match head.content_range {
        Some((Some((start, end_incl)), _)) => Some(end_incl.saturating_sub(start) + 1),
        _ => head.content_length,
    };
    if let Some(expected) = expected {
        if received != expected {
            return Err(FetchError::PartialTransfer { expected, received });
        }
    }

    // Empty resource: no body, so the length was never sent from the write callback.
    if !length_sent {
        if let Some((_, Some(total))) = head.content_range {
            let _ = tx.blocking_send(Ok(FetchEvent::ContentLength(total)));
        }
    }

    Ok(())
}
