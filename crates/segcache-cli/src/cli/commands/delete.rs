//! `segcache delete <id>` – drop one resource's segments.

use anyhow::Result;
use segcache_core::cache::CacheManager;

pub async fn run_delete(cache: &CacheManager, id: &str) -> Result<()> {
    if !cache.data_exists(id).await? {
        println!("Nothing cached for {}.", id);
        return Ok(());
    }
    cache.delete(id).await?;
    println!("Deleted cached segments of {}.", id);
    Ok(())
}
