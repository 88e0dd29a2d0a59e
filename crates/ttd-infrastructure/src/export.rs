//! Document sinks: a downloadable file and the system clipboard.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use ttd_core::document::ExportedDocument;
use ttd_core::error::{Result, TtdError};
use ttd_core::export::{DocumentSink, ExportTarget};

/// Writes the document as `<dir>/<file_name>`.
#[derive(Debug, Clone)]
pub struct FileDownloadSink {
    dir: PathBuf,
}

impl FileDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSink for FileDownloadSink {
    fn target(&self) -> ExportTarget {
        ExportTarget::File
    }

    async fn deliver(&self, document: &ExportedDocument) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            TtdError::export(format!("Cannot create '{}': {}", self.dir.display(), e))
        })?;

        let path = self.dir.join(&document.file_name);
        tokio::fs::write(&path, document.content.as_bytes())
            .await
            .map_err(|e| TtdError::export(format!("Cannot write '{}': {}", path.display(), e)))?;

        tracing::info!("[FileDownloadSink] Wrote {}", path.display());
        Ok(path.display().to_string())
    }
}

/// Places the document text on the system clipboard.
#[derive(Debug, Clone, Default)]
pub struct ClipboardSink;

impl ClipboardSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentSink for ClipboardSink {
    fn target(&self) -> ExportTarget {
        ExportTarget::Clipboard
    }

    async fn deliver(&self, document: &ExportedDocument) -> Result<String> {
        let text = document.content.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| TtdError::export(format!("Clipboard unavailable: {}", e)))?;
            clipboard
                .set_text(text)
                .map_err(|e| TtdError::export(format!("Clipboard write failed: {}", e)))
        })
        .await
        .map_err(|e| TtdError::internal(format!("Clipboard task failed: {}", e)))??;

        tracing::info!("[ClipboardSink] Copied {} bytes", document.content.len());
        Ok("clipboard".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document() -> ExportedDocument {
        ExportedDocument {
            file_name: "target-trial-protocol-1700000000000.md".to_string(),
            content: "# TARGET TRIAL PROTOCOL\n".to_string(),
        }
    }

    #[tokio::test]
    async fn test_file_sink_writes_named_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FileDownloadSink::new(temp_dir.path().join("downloads"));

        let location = sink.deliver(&document()).await.unwrap();
        let path = temp_dir
            .path()
            .join("downloads")
            .join("target-trial-protocol-1700000000000.md");
        assert_eq!(location, path.display().to_string());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# TARGET TRIAL PROTOCOL\n");
        assert_eq!(sink.target(), ExportTarget::File);
    }

    #[tokio::test]
    async fn test_file_sink_reports_unwritable_dir() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = FileDownloadSink::new(&blocker)
            .deliver(&document())
            .await
            .unwrap_err();
        assert!(matches!(err, TtdError::Export(_)));
    }
}
