//! `segcache status` – cache directory, size and budget.

use anyhow::Result;
use segcache_core::cache::CacheManager;

use super::mib;

pub async fn run_status(cache: &CacheManager) -> Result<()> {
    let total = cache.total_cache_size().await;
    println!("cache dir: {}", cache.storage().root().display());
    println!("size:      {} ({} bytes)", mib(total), total);
    println!("budget:    {} MB", cache.max_cache_size_mb());
    Ok(())
}
