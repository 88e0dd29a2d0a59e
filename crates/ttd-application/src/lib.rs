//! Application layer: turn processing and session lifecycle.

pub mod protocol_usecase;

pub use protocol_usecase::{ExportFailure, Progress, ProtocolUseCase, TurnError, TurnOutcome};
