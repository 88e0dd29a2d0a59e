//! Configuration service.
//!
//! Loads `AppConfig` from `config.toml` and caches it. A missing file yields
//! the defaults; an unreadable or invalid one yields the defaults and a warning.

use crate::paths::TtdPaths;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use ttd_core::config::AppConfig;
use ttd_core::error::{Result, TtdError};

#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Service reading the default `config.toml`.
    pub fn new() -> Self {
        let path = match TtdPaths::config_file() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("[ConfigService] {}; using default configuration", e);
                None
            }
        };
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the configuration, loading it on first access.
    pub fn get_config(&self) -> AppConfig {
        if let Ok(read_lock) = self.config.read() {
            if let Some(cached) = read_lock.as_ref() {
                return cached.clone();
            }
        }

        let loaded = match &self.path {
            Some(path) => Self::load_or_default(path),
            None => AppConfig::default(),
        };

        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    fn load_or_default(path: &Path) -> AppConfig {
        match Self::load_from(path) {
            Ok(Some(config)) => {
                tracing::debug!("[ConfigService] Loaded {}", path.display());
                config
            }
            Ok(None) => AppConfig::default(),
            Err(e) => {
                tracing::warn!(
                    "[ConfigService] Failed to load {}: {}; using default configuration",
                    path.display(),
                    e
                );
                AppConfig::default()
            }
        }
    }

    /// Reads and parses a config file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(AppConfig))`: File parsed
    /// - `Ok(None)`: File doesn't exist
    /// - `Err`: File unreadable or not valid TOML for `AppConfig`
    pub fn load_from(path: &Path) -> Result<Option<AppConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| TtdError::io(format!("Failed to read '{}': {}", path.display(), e)))?;
        Ok(Some(toml::from_str(&content)?))
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
        assert_eq!(service.get_config(), AppConfig::default());
    }

    #[test]
    fn test_reads_and_caches_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[assistant]\nmodel = \"claude-opus-4-1\"\n").unwrap();

        let service = ConfigService::with_path(path.clone());
        assert_eq!(service.get_config().assistant.model, "claude-opus-4-1");

        fs::write(&path, "[assistant]\nmodel = \"other\"\n").unwrap();
        assert_eq!(service.get_config().assistant.model, "claude-opus-4-1");
        assert_eq!(
            ConfigService::with_path(path).get_config().assistant.model,
            "other"
        );
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[assistant\nmax_tokens = ").unwrap();

        assert!(ConfigService::load_from(&path).is_err());
        let service = ConfigService::with_path(path);
        assert_eq!(service.get_config(), AppConfig::default());
    }
}
