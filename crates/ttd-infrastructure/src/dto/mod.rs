//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs are the versioned on-disk schema. They are private to the
//! infrastructure layer and absorb storage format changes over time.
//!
//! ### Snapshot Version History
//! - **1.0.0**: Initial schema (`messages`, `phase`, `protocol`, `currentItem`, `timestamp`)

mod snapshot;

pub use snapshot::{
    MessageV1_0_0, ProtocolV1_0_0, SNAPSHOT_ENTITY, SnapshotDTO, SnapshotV1_0_0,
    create_snapshot_migrator,
};
