//! Storage layer: atomic files and key-value store implementations.

mod atomic_file;
mod file_store;
mod memory_store;
mod secret_storage;

pub use atomic_file::{AtomicFile, AtomicFileError};
pub use file_store::FileKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
pub use secret_storage::{SecretStorage, SecretStorageError};
