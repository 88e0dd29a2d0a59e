pub mod config_service;
pub mod dto;
pub mod export;
pub mod paths;
pub mod snapshot_gateway;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::export::{ClipboardSink, FileDownloadSink};
pub use crate::paths::TtdPaths;
pub use crate::snapshot_gateway::{SaveStatus, SnapshotGateway};
pub use crate::storage::{FileKeyValueStore, InMemoryKeyValueStore, SecretStorage};
