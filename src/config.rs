use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::CatalogOptions;
use crate::fetch::RetryPolicy;
use crate::loader::LoaderOptions;
use crate::utils::expand_tilde;

pub const ENV_RPC_URL: &str = "WALLGALLERY_RPC_URL";
pub const ENV_RPC_KEY: &str = "WALLGALLERY_RPC_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub popularity: PopularityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// HTTP(S) base URL of the catalog data, or a local directory mirror.
    pub data_source: String,
    pub cdn_base: String,
    pub default_cdn_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub initial_categories: usize,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    /// Blobs longer than this many characters decode on the blocking pool.
    #[serde(default = "default_offload_threshold")]
    pub offload_threshold: usize,
}

fn default_offload_threshold() -> usize {
    crate::codec::OFFLOAD_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityConfig {
    /// Base URL of the stats RPC backend. Unset disables it.
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub ttl_secs: u64,
    pub stats_ttl_secs: u64,
    pub ranked_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Settings and stats cache directory; defaults to the platform data dir.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_source: "data".to_string(),
            cdn_base: "https://cdn.jsdelivr.net/gh/IT-NuanxinPro/nuanXinProPic".to_string(),
            default_cdn_tag: "v1.1.17".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            initial_categories: 3,
            batch_size: 3,
            batch_pause_ms: 150,
            offload_threshold: default_offload_threshold(),
        }
    }
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            api_key: None,
            ttl_secs: 5 * 60,
            stats_ttl_secs: 60 * 60,
            ranked_limit: 100,
        }
    }
}

impl CatalogConfig {
    pub fn is_remote(&self) -> bool {
        self.data_source.starts_with("http://") || self.data_source.starts_with("https://")
    }

    pub fn local_root(&self) -> PathBuf {
        expand_tilde(&self.data_source)
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

impl LoaderConfig {
    pub fn options(&self) -> LoaderOptions {
        LoaderOptions {
            initial_categories: self.initial_categories.max(1),
            batch_size: self.batch_size.max(1),
            batch_pause: Duration::from_millis(self.batch_pause_ms),
        }
    }
}

impl PopularityConfig {
    /// Backend URL and key, when both are configured.
    pub fn backend(&self) -> Option<(&str, &str)> {
        let url = self.rpc_url.as_deref().filter(|s| !s.is_empty())?;
        let key = self.api_key.as_deref().filter(|s| !s.is_empty())?;
        Some((url, key))
    }
}

impl Config {
    /// Return the path to the configuration file.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("com", "wallgallery", "wallgallery")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load the default config file, creating it if missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, creating a default file if missing. A file
    /// that does not parse is reported and replaced by defaults in memory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            match toml::from_str::<Config>(&data) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse config, using defaults"
                    );
                    Config::default()
                }
            }
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables override the backend settings.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_RPC_URL) {
            self.popularity.rpc_url = Some(url);
        }
        if let Ok(key) = std::env::var(ENV_RPC_KEY) {
            self.popularity.api_key = Some(key);
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let data = toml::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.storage
            .state_dir
            .as_ref()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .or_else(|| {
                directories::ProjectDirs::from("com", "wallgallery", "wallgallery")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from(".wallgallery"))
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            retry: self.fetch.retry_policy(),
            offload_threshold: self.loader.offload_threshold,
        }
    }
}
