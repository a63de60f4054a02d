//! CLI command handlers, one per file.

mod clean;
mod delete;
mod fetch;
mod info;
mod status;
mod trim;

pub use clean::run_clean;
pub use delete::run_delete;
pub use fetch::{parse_headers, run_fetch, FetchArgs};
pub use info::run_info;
pub use status::run_status;
pub use trim::run_trim;

/// Bytes as MiB with one decimal, for human output.
pub(crate) fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / 1_048_576.0)
}
