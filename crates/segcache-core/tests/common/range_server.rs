//! Minimal HTTP/1.1 server answering Range GETs for integration tests.
//!
//! Serves one static body; a GET with `Range: bytes=X-Y` gets 206 with a
//! `Content-Range` header, a plain GET gets 200 with the whole body.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, Default)]
pub struct RangeServerOptions {
    /// Answer every GET with 200 and the full body, ignoring `Range`.
    pub ignore_ranges: bool,
    /// Answer every GET with this status and an empty body.
    pub fail_status: Option<u16>,
    /// Send the response headers, then no body until the client hangs up.
    pub stall: bool,
}

/// Handle to a running server.
pub struct RangeServer {
    pub url: String,
    counters: Arc<Counters>,
}

impl RangeServer {
    /// Number of GET requests served so far.
    pub fn hits(&self) -> usize {
        self.counters.hits.load(Ordering::SeqCst)
    }

    /// Number of stalled responses whose client closed the connection.
    pub fn hangups(&self) -> usize {
        self.counters.hangups.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    hangups: AtomicUsize,
}

/// Start a server on a background thread serving `body`. Runs until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let body = Arc::new(body);
    let counters = Arc::new(Counters::default());
    let shared = Arc::clone(&counters);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counters = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &body, opts, &counters));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/media.bin", port),
        counters,
    }
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: RangeServerOptions, counters: &Counters) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    counters.hits.fetch_add(1, Ordering::SeqCst);

    if let Some(code) = opts.fail_status {
        let response = format!("HTTP/1.1 {} Error\r\nContent-Length: 0\r\n\r\n", code);
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let total = body.len() as u64;
    let (status, content_range, slice) = match range {
        Some((start, end_incl)) if !opts.ignore_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                ("416 Range Not Satisfiable", Some(format!("bytes */{}", total)), &body[0..0])
            } else {
                (
                    "206 Partial Content",
                    Some(format!("bytes {}-{}/{}", start, end_incl, total)),
                    &body[start as usize..=end_incl as usize],
                )
            }
        }
        _ => ("200 OK", None, body),
    };
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n",
        status,
        slice.len()
    );
    if let Some(cr) = content_range {
        response.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    if opts.stall {
        // Hold the body back; a read returning 0 means the client went away.
        let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(30)));
        if let Ok(0) = stream.read(&mut buf) {
            counters.hangups.fetch_add(1, Ordering::SeqCst);
        }
        return;
    }
    let _ = stream.write_all(slice);
}

/// Returns (method, optional (start, end_inclusive)) for `Range: bytes=X-Y` or `bytes=X-`.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .map(str::trim)
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| {
            let spec = value.trim().strip_prefix("bytes=")?;
            let (a, b) = spec.split_once('-')?;
            let start = a.trim().parse::<u64>().ok()?;
            let end = match b.trim() {
                "" => u64::MAX,
                b => b.parse::<u64>().ok()?,
            };
            Some((start, end))
        });
    (method, range)
}
