use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Budget applied before any explicit configuration, in megabytes.
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 100;

/// HTTP transport parameters for the default range fetcher (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Hard wall-clock limit per request, in seconds.
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/segcache/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of cached segment files, in whole megabytes.
    pub max_cache_size_mb: u64,
    /// Directory holding segment files (None = `$XDG_CACHE_HOME/segcache/media`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Maximum fetch operations running at once per scheduler (None = no limit).
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_mb: DEFAULT_MAX_CACHE_SIZE_MB,
            cache_dir: None,
            max_concurrent_fetches: None,
            http: HttpConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Configured cache directory, or the XDG default.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("segcache")?;
        Ok(xdg_dirs.get_cache_home().join("media"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segcache")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CacheConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CacheConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: CacheConfig = toml::from_str(&data)?;
    Ok(cfg)
}
