//! Persistent segment metadata (SQLite via sqlx).
//!
//! Stores one row per cached byte range (keyed by resource and start offset)
//! and the declared content length of each resource once it is known.

pub mod db;
mod segments;
pub mod store;
pub mod types;

pub use db::*;
pub use store::SegmentStore;
pub use types::*;

#[cfg(test)]
mod tests;
