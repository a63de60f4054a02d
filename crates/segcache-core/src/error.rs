//! Typed errors at the storage and fetch seams.
//!
//! Everything else (database, config, CLI plumbing) uses `anyhow`.

use std::io;

/// Failure of a file-storage primitive.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    /// Key would escape the storage root (path separator or dot segment).
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            key: key.into(),
            source,
        }
    }
}

/// Error reported once per fetch operation through `did_finish_request`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Transfer ended before the requested range was delivered.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Reading cached bytes or writing fetched bytes failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    /// The operation was cancelled before it finished.
    #[error("cancelled")]
    Cancelled,
    /// Any other transport failure (worker thread gone, metadata lookup failed, ...).
    #[error("transport: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
