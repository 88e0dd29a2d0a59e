//! Session snapshot DTOs and migrations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use version_migrate::{IntoDomain, Versioned};

use ttd_core::conversation::{Message, MessageRole};
use ttd_core::phase::Phase;
use ttd_core::protocol::{ItemId, ItemSet, ProtocolStore, RESEARCH_QUESTION_KEY};
use ttd_core::session::{Session, Snapshot};

/// Entity name used with the snapshot migrator.
pub const SNAPSHOT_ENTITY: &str = "session_snapshot";

/// Conversation message as stored (role is `"user"` or `"assistant"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageV1_0_0 {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Protocol record as stored. Item maps are keyed by item storage keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolV1_0_0 {
    #[serde(default)]
    pub research_question: String,
    #[serde(default)]
    pub specification: BTreeMap<String, String>,
    #[serde(default)]
    pub emulation: BTreeMap<String, String>,
}

/// Session snapshot V1.0.0 (initial version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
#[serde(rename_all = "camelCase")]
pub struct SnapshotV1_0_0 {
    #[serde(default)]
    pub messages: Vec<MessageV1_0_0>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub protocol: ProtocolV1_0_0,
    #[serde(default)]
    pub current_item: Option<String>,
    /// Capture time, Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

/// Type alias for the latest snapshot version.
pub type SnapshotDTO = SnapshotV1_0_0;

impl Default for SnapshotV1_0_0 {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            phase: Phase::Introduction,
            protocol: ProtocolV1_0_0::default(),
            current_item: None,
            timestamp: 0,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl From<MessageV1_0_0> for Message {
    fn from(dto: MessageV1_0_0) -> Self {
        let role = match dto.role.as_str() {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::Researcher,
        };
        Message {
            role,
            content: dto.content,
            timestamp: dto.timestamp,
        }
    }
}

impl From<&Message> for MessageV1_0_0 {
    fn from(message: &Message) -> Self {
        MessageV1_0_0 {
            role: message.role.as_api_str().to_string(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

impl From<ProtocolV1_0_0> for ProtocolStore {
    fn from(dto: ProtocolV1_0_0) -> Self {
        let mut store = ProtocolStore::new();
        if let Err(e) = store.set_field(RESEARCH_QUESTION_KEY, dto.research_question) {
            tracing::warn!("[SnapshotDTO] Dropping research question: {}", e);
        }

        for (key, value) in dto.specification.into_iter().chain(dto.emulation) {
            match ItemId::from_key(&key) {
                Some(item) => {
                    if let Err(e) = store.set_item(item, value) {
                        tracing::warn!("[SnapshotDTO] Dropping item {}: {}", key, e);
                    }
                }
                None => tracing::debug!("[SnapshotDTO] Ignoring unknown item key '{}'", key),
            }
        }
        store
    }
}

impl From<&ProtocolStore> for ProtocolV1_0_0 {
    fn from(store: &ProtocolStore) -> Self {
        let collect = |set: ItemSet| -> BTreeMap<String, String> {
            store
                .entries(set)
                .map(|(item, value)| (item.key().to_string(), value.to_string()))
                .collect()
        };
        ProtocolV1_0_0 {
            research_question: store.research_question().to_string(),
            specification: collect(ItemSet::Specification),
            emulation: collect(ItemSet::Emulation),
        }
    }
}

/// Convert SnapshotV1_0_0 DTO to domain model.
impl IntoDomain<Snapshot> for SnapshotV1_0_0 {
    fn into_domain(self) -> Snapshot {
        let current_item = self.current_item.as_deref().and_then(|key| {
            ItemId::from_key(key).or_else(|| ItemId::from_marker_code(key))
        });
        let messages = self.messages.into_iter().map(Message::from).collect();

        Snapshot {
            session: Session::from_parts(self.protocol.into(), self.phase, current_item, messages),
            captured_at: self.timestamp,
        }
    }
}

/// Convert domain model to SnapshotV1_0_0 DTO for persistence.
impl version_migrate::FromDomain<Snapshot> for SnapshotV1_0_0 {
    fn from_domain(snapshot: Snapshot) -> Self {
        let session = snapshot.session;
        SnapshotV1_0_0 {
            messages: session.messages().iter().map(MessageV1_0_0::from).collect(),
            phase: session.phase,
            protocol: ProtocolV1_0_0::from(&session.protocol),
            current_item: session.current_item.map(|item| item.key().to_string()),
            timestamp: snapshot.captured_at,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates and configures a Migrator instance for session snapshots.
///
/// # Migration Path
///
/// - V1.0.0 → Snapshot: Converts DTO to domain model
///
/// # Example
///
/// ```ignore
/// let migrator = create_snapshot_migrator();
/// let snapshot: Snapshot = migrator.load_flat_from(SNAPSHOT_ENTITY, json_value)?;
/// ```
pub fn create_snapshot_migrator() -> version_migrate::Migrator {
    let mut migrator = version_migrate::Migrator::builder().build();

    let snapshot_path = version_migrate::Migrator::define(SNAPSHOT_ENTITY)
        .from::<SnapshotV1_0_0>()
        .into_with_save::<Snapshot>();

    migrator
        .register(snapshot_path)
        .expect("Failed to register session_snapshot migration path");

    migrator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_migration_v1_0_0_to_domain() {
        let migrator = create_snapshot_migrator();

        let json = serde_json::json!({
            "version": "1.0.0",
            "messages": [
                { "role": "assistant", "content": "Welcome!", "timestamp": 1 },
                { "role": "user", "content": "statins and MI risk", "timestamp": 2 }
            ],
            "phase": "specification",
            "protocol": {
                "researchQuestion": "statins and MI risk",
                "specification": { "6a_eligibility": "adults 40-75", "9x_unknown": "ignored" },
                "emulation": {}
            },
            "currentItem": "6b_treatments",
            "timestamp": 1700000000000i64
        });

        let snapshot: Snapshot = migrator.load_flat_from(SNAPSHOT_ENTITY, json).unwrap();
        let session = snapshot.session;

        assert_eq!(snapshot.captured_at, 1700000000000);
        assert_eq!(session.phase, Phase::Specification);
        assert_eq!(session.current_item, Some(ItemId::Treatments));
        assert_eq!(session.protocol.research_question(), "statins and MI risk");
        assert_eq!(session.protocol.item(ItemId::Eligibility), "adults 40-75");
        assert_eq!(session.protocol.item(ItemId::EligibilityOps), "");
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, MessageRole::Researcher);
    }

    #[test]
    fn test_snapshot_save_uses_flat_camel_case() {
        let migrator = create_snapshot_migrator();
        let mut session = Session::seeded();
        session.record_researcher_message("statins").unwrap();
        let snapshot = Snapshot {
            session,
            captured_at: 42,
        };

        let json_str = migrator.save_domain_flat(SNAPSHOT_ENTITY, &snapshot).unwrap();
        assert!(json_str.contains("\"version\":\"1.0.0\""));
        assert!(json_str.contains("\"researchQuestion\":\"statins\""));
        assert!(json_str.contains("\"currentItem\":\"6a_eligibility\""));
        assert!(json_str.contains("\"phase\":\"specification\""));
        assert!(json_str.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_unknown_phase_fails_to_load() {
        let migrator = create_snapshot_migrator();
        let json = serde_json::json!({ "version": "1.0.0", "phase": "finished" });
        let result: Result<Snapshot, _> = migrator.load_flat_from(SNAPSHOT_ENTITY, json);
        assert!(result.is_err());
    }
}
