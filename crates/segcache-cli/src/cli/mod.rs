//! CLI for the segcache media range cache.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segcache_core::cache::CacheManager;
use segcache_core::config;

use commands::{run_clean, run_delete, run_fetch, run_info, run_status, run_trim, FetchArgs};

/// Top-level CLI for segcache.
#[derive(Debug, Parser)]
#[command(name = "segcache")]
#[command(about = "segcache: on-device byte-range cache for streamed media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show cache directory, total size and budget.
    Status,

    /// Show declared length, stored segments and coverage of one resource.
    Info {
        /// Resource identifier.
        id: String,
    },

    /// Delete every cached segment of a resource.
    Delete {
        /// Resource identifier.
        id: String,
    },

    /// Delete everything in the cache.
    Clean,

    /// Evict least recently updated segments until the cache is under budget.
    Trim,

    /// Fetch a byte range of a URL through the cache.
    Fetch {
        /// Direct HTTP/HTTPS URL of the media.
        url: String,
        /// Resource identifier the bytes are cached under.
        #[arg(long)]
        id: String,
        /// First byte to fetch.
        #[arg(long, default_value = "0", value_name = "N")]
        start: u64,
        /// Byte after the last one to fetch; defaults to the end of the resource.
        #[arg(long, value_name = "N")]
        end: Option<u64>,
        /// Extra request header as `Name: value` (repeatable).
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let cache = CacheManager::open(&cfg).await?;

        match cli.command {
            CliCommand::Status => run_status(&cache).await?,
            CliCommand::Info { id } => run_info(&cache, &id).await?,
            CliCommand::Delete { id } => run_delete(&cache, &id).await?,
            CliCommand::Clean => run_clean(&cache).await?,
            CliCommand::Trim => run_trim(&cache).await?,
            CliCommand::Fetch {
                url,
                id,
                start,
                end,
                headers,
            } => {
                let args = FetchArgs {
                    url,
                    id,
                    start,
                    end,
                    headers,
                };
                run_fetch(&cache, &cfg, args).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
