//! segcache core: an on-device byte-range cache for progressively
//! downloaded media, plus the per-resource scheduler that fills it.

pub mod cache;
pub mod config;
pub mod coverage;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod scheduler;
pub mod segment_db;
pub mod storage;

pub use cache::CacheManager;
pub use error::{FetchError, StorageError};
pub use scheduler::{RequestScheduler, SchedulerListener};
