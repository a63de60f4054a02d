//! `segcache clean` – empty the cache.

use anyhow::Result;
use segcache_core::cache::CacheManager;

pub async fn run_clean(cache: &CacheManager) -> Result<()> {
    cache.clean_all().await?;
    println!("Cache emptied.");
    Ok(())
}
