//! File-backed key-value store.

use super::atomic_file::{AtomicFile, AtomicFileError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use ttd_core::error::{Result, TtdError};
use ttd_core::session::KeyValueStore;

/// Stores each key as `<dir>/<key>.json`.
///
/// Blocking file I/O runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform state directory.
    pub fn default_location() -> Result<Self> {
        let dir = crate::paths::TtdPaths::state_dir().map_err(|e| TtdError::config(e.to_string()))?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, key: &str) -> Result<AtomicFile> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TtdError::storage(format!("Invalid storage key '{}'", key)));
        }
        Ok(AtomicFile::new(self.dir.join(format!("{}.json", key))))
    }
}

fn to_storage_error(context: &str, err: AtomicFileError) -> TtdError {
    TtdError::storage(format!("{}: {}", context, err))
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| TtdError::internal(format!("Storage task failed: {}", e)))?
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file_for(key)?;
        run_blocking(move || {
            file.load()
                .map_err(|e| to_storage_error(&format!("Failed to read {}", file.path().display()), e))
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let file = self.file_for(key)?;
        run_blocking(move || {
            file.save(&value).map_err(|e| {
                to_storage_error(&format!("Failed to write {}", file.path().display()), e)
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let file = self.file_for(key)?;
        run_blocking(move || {
            file.remove().map_err(|e| {
                to_storage_error(&format!("Failed to delete {}", file.path().display()), e)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path());

        assert!(store.get("target-trial-state").await.unwrap().is_none());

        store
            .set("target-trial-state", "{\"phase\":\"introduction\"}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("target-trial-state").await.unwrap().as_deref(),
            Some("{\"phase\":\"introduction\"}")
        );
        assert!(temp_dir.path().join("target-trial-state.json").exists());

        store.delete("target-trial-state").await.unwrap();
        assert!(store.get("target-trial-state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_key_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path());
        store.delete("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_path_like_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp_dir.path());

        let err = store.set("../escape", "x".to_string()).await.unwrap_err();
        assert!(matches!(err, TtdError::Storage(_)));
    }
}
