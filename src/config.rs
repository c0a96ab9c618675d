//! Application configuration: JSON file with per-section defaults and
//! a small set of environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vigil_core_types::ComparisonConfig;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = ".vigil";

/// Where artifacts, results and the cache live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the data directory
    pub base_dir: PathBuf,

    /// Cache entry time to live, in hours
    pub cache_ttl_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_ttl_hours: 24,
        }
    }
}

impl StorageConfig {
    pub fn reports_dir(&self) -> PathBuf {
        self.base_dir.join("reports")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join("results")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

/// External vision model settings. Analysis is skipped when no API
/// key is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub comparison: ComparisonConfig,
    pub storage: StorageConfig,
    pub vision: VisionConfig,
}

impl AppConfig {
    /// Load configuration from `path`, or from `.vigil/config.json`
    /// when no path is given. A missing file yields defaults; a file
    /// that exists but does not parse is an error. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_DATA_DIR).join("config.json"),
        };

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?;
            info!(path = %config_path.display(), "loaded configuration");
            config
        } else {
            warn!(
                path = %config_path.display(),
                "config file not found, using defaults"
            );
            AppConfig::default()
        };

        config.apply_env_overrides();
        config
            .comparison
            .validate()
            .context("invalid comparison configuration")?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("VIGIL_VISION_API_KEY") {
            if !key.is_empty() {
                self.vision.api_key = Some(key);
            }
        }
        if let Ok(hours) = std::env::var("VIGIL_CACHE_TTL_HOURS") {
            match hours.parse::<u64>() {
                Ok(hours) => self.storage.cache_ttl_hours = hours,
                Err(_) => warn!(value = %hours, "ignoring invalid VIGIL_CACHE_TTL_HOURS"),
            }
        }
        if let Ok(dir) = std::env::var("VIGIL_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.base_dir = PathBuf::from(dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.comparison.validate().is_ok());
        assert_eq!(config.storage.cache_ttl_hours, 24);
        assert!(config.vision.api_key.is_none());
    }

    #[test]
    fn storage_paths_derive_from_base_dir() {
        let storage = StorageConfig {
            base_dir: PathBuf::from("/tmp/vigil-data"),
            ..Default::default()
        };
        assert_eq!(storage.reports_dir(), PathBuf::from("/tmp/vigil-data/reports"));
        assert_eq!(storage.cache_dir(), PathBuf::from("/tmp/vigil-data/cache"));
        assert_eq!(storage.results_dir(), PathBuf::from("/tmp/vigil-data/results"));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"comparison": {"pixel_threshold": 3}}"#).unwrap();
        assert_eq!(config.comparison.pixel_threshold, 3);
        assert_eq!(config.comparison.max_changed_regions, 10);
        assert_eq!(config.vision.model, "gemini-2.0-flash");
    }

    #[test]
    fn cache_ttl_converts_to_duration() {
        let storage = StorageConfig {
            cache_ttl_hours: 2,
            ..Default::default()
        };
        assert_eq!(storage.cache_ttl(), Duration::from_secs(7200));
    }
}
