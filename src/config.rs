// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("jpeg quality must be between 1 and 100, got {0}")]
    JpegQuality(u8),
}

/// Settings shared by the downloader, the record store and the chapter source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Application-private root; chapters land under `<root>/Downloads/...`.
    pub storage_root: PathBuf,
    pub database_path: PathBuf,
    pub api_base_url: String,
    pub jpeg_quality: u8,
    /// Pause between two chapters of a batch.
    pub chapter_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Page bodies larger than this are rejected.
    pub max_image_bytes: u64,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        let storage_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("offline-chapters");
        Self {
            database_path: storage_root.join("downloads.db"),
            storage_root,
            api_base_url: "http://localhost:3000".to_string(),
            jpeg_quality: 90,
            chapter_delay_ms: 100,
            request_timeout_secs: 30,
            max_image_bytes: 32 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36".to_string(),
        }
    }
}

impl DownloaderConfig {
    /// Reads a JSON config file. A missing file yields the defaults; absent
    /// fields fall back to their defaults individually.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        Ok(())
    }

    pub fn chapter_delay(&self) -> Duration {
        Duration::from_millis(self.chapter_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
