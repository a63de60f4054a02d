//! `segcache info <id>` – segments and coverage of one resource.

use anyhow::Result;
use segcache_core::cache::CacheManager;

pub async fn run_info(cache: &CacheManager, id: &str) -> Result<()> {
    let declared = cache.declared_length(id).await?;
    let segments = cache.segments(id).await?;
    let fully = cache.is_fully_cached(id).await?;

    println!(
        "resource: {}\nlength:   {}\ncached:   {}",
        id,
        declared.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string()),
        if fully { "fully" } else { "partially or not" }
    );
    if segments.is_empty() {
        println!("No segments stored.");
        return Ok(());
    }
    println!("{:<14} {:<14} {:<12} {}", "START", "END", "LENGTH", "KEY");
    for s in segments {
        println!(
            "{:<14} {:<14} {:<12} {}",
            s.start_offset,
            s.end_offset(),
            s.length,
            s.storage_key
        );
    }
    Ok(())
}
