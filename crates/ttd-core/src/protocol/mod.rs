//! Protocol items and the record that holds their values.

pub mod item;
pub mod store;

pub use item::{ItemId, ItemSet};
pub use store::{FieldKey, ProtocolStore, RESEARCH_QUESTION_KEY};
