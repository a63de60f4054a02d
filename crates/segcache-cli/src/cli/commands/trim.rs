//! `segcache trim` – run an eviction pass now.

use anyhow::Result;
use segcache_core::cache::CacheManager;

use super::mib;

pub async fn run_trim(cache: &CacheManager) -> Result<()> {
    let report = cache.trim().await?;
    if report.evicted.is_empty() {
        println!("Under budget ({}), nothing evicted.", mib(report.bytes_before));
        return Ok(());
    }
    for s in &report.evicted {
        println!("evicted {} ({} bytes)", s.storage_key, s.length);
    }
    println!("{} -> {}", mib(report.bytes_before), mib(report.bytes_after));
    Ok(())
}
