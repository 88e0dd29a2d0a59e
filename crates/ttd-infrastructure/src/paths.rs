//! Unified path management for ttd configuration and data files.
//!
//! All paths are resolved via AppPaths from the version-migrate crate so every
//! platform gets its conventional locations.

use std::path::PathBuf;
use version_migrate::AppPaths;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for ttd.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/ttd/               # Config directory
/// ├── config.toml              # Application configuration
/// ├── secret.json              # API keys
/// └── logs/                    # Application logs
///     └── ttd.log.YYYY-MM-DD
///
/// ~/.local/share/ttd/          # Data directory
/// └── state/                   # Key-value store (one JSON file per key)
///     └── target-trial-state.json
/// ```
pub struct TtdPaths;

impl TtdPaths {
    fn app_paths() -> AppPaths {
        AppPaths::new("ttd")
    }

    pub fn config_dir() -> Result<PathBuf, PathError> {
        Self::app_paths()
            .config_dir()
            .map_err(|_| PathError::HomeDirNotFound)
    }

    pub fn data_dir() -> Result<PathBuf, PathError> {
        Self::app_paths()
            .data_dir()
            .map_err(|_| PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path to `secret.json`.
    ///
    /// Ensure this file has restrictive permissions (e.g., 600).
    pub fn secret_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("secret.json"))
    }

    /// Directory backing the file key-value store.
    pub fn state_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("state"))
    }

    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Default target for downloaded protocol documents.
    ///
    /// The user's download directory, or the current directory when the
    /// platform has none.
    pub fn default_download_dir() -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let config_dir = TtdPaths::config_dir().unwrap();
        assert!(config_dir.ends_with("ttd"));
    }

    #[test]
    fn test_files_live_under_config_dir() {
        let config_dir = TtdPaths::config_dir().unwrap();
        let config_file = TtdPaths::config_file().unwrap();
        let secret_file = TtdPaths::secret_file().unwrap();
        let logs_dir = TtdPaths::logs_dir().unwrap();

        assert!(config_file.ends_with("config.toml"));
        assert!(secret_file.ends_with("secret.json"));
        assert!(logs_dir.ends_with("logs"));
        assert!(config_file.starts_with(&config_dir));
        assert!(secret_file.starts_with(&config_dir));
        assert!(logs_dir.starts_with(&config_dir));
    }

    #[test]
    fn test_state_dir() {
        let state_dir = TtdPaths::state_dir().unwrap();
        assert!(state_dir.ends_with("state"));
        assert!(state_dir.starts_with(TtdPaths::data_dir().unwrap()));
    }
}
