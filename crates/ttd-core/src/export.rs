//! Document export boundary.

use crate::document::ExportedDocument;
use crate::error::Result;
use async_trait::async_trait;

/// Which export path a sink implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    File,
    Clipboard,
}

impl ExportTarget {
    /// Advice shown when this target fails.
    pub fn fallback_hint(&self) -> &'static str {
        match self {
            ExportTarget::File => {
                "Failed to download protocol. Please try copying it with /copy instead."
            }
            ExportTarget::Clipboard => {
                "Failed to copy to clipboard. Please try downloading it with /download instead."
            }
        }
    }
}

/// Destination for an assembled protocol document.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    fn target(&self) -> ExportTarget;

    /// Delivers the document and returns a short description of where it went.
    async fn deliver(&self, document: &ExportedDocument) -> Result<String>;
}
