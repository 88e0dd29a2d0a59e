//! Domain model for the Target Trial Designer.
//!
//! This crate owns the protocol progression state machine: the item and phase
//! model, marker parsing, instruction-context construction, and document
//! assembly. Everything that talks to the outside world is expressed as a
//! trait here and implemented in the infrastructure and interaction crates.

pub mod assistant;
pub mod config;
pub mod context;
pub mod conversation;
pub mod document;
pub mod error;
pub mod export;
pub mod markers;
pub mod phase;
pub mod protocol;
pub mod session;

// Re-export common error type
pub use error::{Result, TtdError};
