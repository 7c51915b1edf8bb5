use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Run configuration, loaded from `~/.config/papergraph/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Width of the worker pool used by every fan-out phase.
    pub workers: usize,

    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub request_interval_ms: u64,
    pub max_retries: u32,
    /// Per-request budget; a hung call fails instead of stalling its phase.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `all_papers.json`, `url_patterns.json`, `all_authors.json`.
    pub state_dir: String,
    pub seed_titles: String,
    pub download_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub user_agent: String,
    pub relay_proxy: String,
    pub timeout_secs: u64,
    pub retries: u32,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            api_key: None,
            request_interval_ms: 1000,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: ".".to_string(),
            seed_titles: "seed_titles.json".to_string(),
            download_dir: "download".to_string(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            // arXiv answers 403 to common crawler agents.
            user_agent: "NoSuchBrowser/1.0".to_string(),
            relay_proxy: "socks5h://127.0.0.1:1080".to_string(),
            timeout_secs: 60,
            retries: 1,
        }
    }
}

// ─── Load ──────────────────────────────────────────────

impl HarvestConfig {
    /// Standard config file path: `~/.config/papergraph/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PAPERGRAPH_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("papergraph")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&contents)?
        } else {
            Self::default()
        };
        if config.api.api_key.is_none() {
            config.api.api_key = env_first([
                "PAPERGRAPH_SEMANTIC_SCHOLAR_API_KEY",
                "SEMANTIC_SCHOLAR_API_KEY",
            ]);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CoreError::Config("workers must be at least 1".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(CoreError::Config("api.timeout_secs must be at least 1".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(CoreError::Config("api.base_url is empty".to_string()));
        }
        Ok(())
    }

    // ─── Derived values ────────────────────────────────────

    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.state_dir)
    }

    pub fn seed_titles_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.seed_titles)
    }

    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.download_dir)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.api.request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_secs)
    }
}

fn env_first<const N: usize>(keys: [&str; N]) -> Option<String> {
    keys.into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
