//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the session value (`Session`), its mutators, and `Snapshot`
//! - `repository`: the key-value persistence boundary (`KeyValueStore`)

mod model;
mod repository;

// Re-export public API
pub use model::{ResponseEffects, Session, Snapshot, WELCOME_MESSAGE};
pub use repository::{KeyValueStore, SESSION_KEY};
