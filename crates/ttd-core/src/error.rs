//! Error types for the Target Trial Designer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole workspace.
///
/// Boundary failures (persistence, export) are converted into these variants at
/// the point of the asynchronous call so callers can turn them into
/// user-visible, non-fatal outcomes.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TtdError {
    /// A protocol field name that is not one of the 17 recognized keys.
    #[error("Invalid protocol field: '{key}'")]
    InvalidField { key: String },

    /// Attempt to clear a protocol field that already holds a value.
    #[error("Protocol field '{key}' is already set and cannot be cleared")]
    FieldLocked { key: String },

    /// Attempt to record an item that does not belong to the active phase.
    #[error("Item '{key}' cannot be recorded during the {phase} phase")]
    ItemOutOfPhase { key: String, phase: String },

    /// A researcher message with no text.
    #[error("Message is empty")]
    EmptyMessage,

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Key-value store failure (get/set/delete)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot schema migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Clipboard or file export failure
    #[error("Export error: {0}")]
    Export(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TtdError {
    pub fn invalid_field(key: impl Into<String>) -> Self {
        Self::InvalidField { key: key.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is an InvalidField error
    pub fn is_invalid_field(&self) -> bool {
        matches!(self, Self::InvalidField { .. })
    }
}

impl From<std::io::Error> for TtdError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for TtdError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TtdError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for TtdError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<version_migrate::MigrationError> for TtdError {
    fn from(err: version_migrate::MigrationError) -> Self {
        use version_migrate::MigrationError;

        match err {
            MigrationError::DeserializationError(_) | MigrationError::SerializationError(_) => {
                Self::Serialization {
                    format: "migration".to_string(),
                    message: err.to_string(),
                }
            }
            _ => Self::Migration(err.to_string()),
        }
    }
}

/// A type alias for `Result<T, TtdError>`.
pub type Result<T> = std::result::Result<T, TtdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let err: TtdError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        match err {
            TtdError::Io { message } => assert!(message.contains("NotFound")),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: TtdError = serde_json::from_str::<serde_json::Value>("{ nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, TtdError::Serialization { ref format, .. } if format == "JSON"));
    }

    #[test]
    fn test_invalid_field_message() {
        let err = TtdError::invalid_field("9z_unknown");
        assert!(err.is_invalid_field());
        assert_eq!(err.to_string(), "Invalid protocol field: '9z_unknown'");
    }
}
