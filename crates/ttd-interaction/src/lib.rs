//! Assistant boundary implementations.

pub mod claude_api_agent;

pub use claude_api_agent::ClaudeApiAgent;
