//! Session domain model.

use crate::conversation::{ConversationLog, Message, MessageRole};
use crate::error::{Result, TtdError};
use crate::markers::parse_response;
use crate::phase::{Phase, PhaseEngine};
use crate::protocol::{ItemId, ProtocolStore, RESEARCH_QUESTION_KEY};
use serde::{Deserialize, Serialize};

/// Opening message shown at the start of every new session.
pub const WELCOME_MESSAGE: &str = "Welcome! I'm your TARGET Trial Design Assistant. I'll help you develop a well-specified observational study design following the TARGET (Transparent Reporting of Observational Studies Emulating a Target Trial) framework.

We'll work through two phases:

1. **Target Trial Specification** - Define a PRAGMATIC CLINICAL TRIAL that could actually be conducted. This is not a theoretical ideal trial, but a realistic randomized trial you could run with real patients and feasible procedures.

2. **Target Trial Emulation** - Map that pragmatic trial design to your observational data.

**Critical concept:** Throughout this process, we'll pay special attention to TIME ZERO - the single point in time when:
- Eligibility criteria are met
- Treatment is assigned
- Follow-up begins

Getting time zero right prevents immortal time bias and other design flaws that plague observational studies.

Let's start! What research question would you like to address? Please describe:
- The intervention or exposure you're interested in
- The outcome(s) you want to study
- The population you're studying";

/// The complete state of one protocol-design conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub protocol: ProtocolStore,
    pub phase: Phase,
    pub current_item: Option<ItemId>,
    pub conversation: ConversationLog,
}

/// What an assistant response changed in the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseEffects {
    /// Stored (marker-free) reply text.
    pub clean_text: String,
    /// Items whose value was recorded from this response.
    pub recorded_items: Vec<ItemId>,
    /// New phase, when the response completed one.
    pub entered_phase: Option<Phase>,
}

impl Session {
    /// A fresh session holding only the welcome message.
    pub fn seeded() -> Self {
        let mut session = Self::default();
        session
            .conversation
            .append(MessageRole::Assistant, WELCOME_MESSAGE);
        session
    }

    /// Restores a session from stored parts, re-deriving nothing.
    pub fn from_parts(
        protocol: ProtocolStore,
        phase: Phase,
        current_item: Option<ItemId>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            protocol,
            phase,
            current_item,
            conversation: messages.into(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.all()
    }

    /// Appends a researcher message and applies the introduction transition.
    ///
    /// Returns the phase entered, if any. Blank text is rejected with
    /// `EmptyMessage` and leaves the session untouched.
    pub fn record_researcher_message(&mut self, text: &str) -> Result<Option<Phase>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TtdError::EmptyMessage);
        }
        let transition = PhaseEngine::on_submission(self.phase, &self.protocol);

        if let Some(next) = transition {
            self.protocol.set_field(RESEARCH_QUESTION_KEY, text)?;
            self.enter(next);
        }

        self.conversation.append(MessageRole::Researcher, text);
        Ok(transition)
    }

    /// Applies a raw assistant response: records confirmed items, advances the
    /// phase, and appends the marker-free text.
    pub fn apply_assistant_response(&mut self, raw: &str) -> ResponseEffects {
        let parsed = parse_response(raw);
        let mut effects = ResponseEffects {
            clean_text: parsed.clean_text.clone(),
            ..Default::default()
        };

        if !parsed.clean_text.is_empty() {
            for item in PhaseEngine::recordable_items(self.phase, &parsed) {
                match self.record_item(item, parsed.clean_text.clone()) {
                    Ok(()) => effects.recorded_items.push(item),
                    Err(e) => tracing::warn!("[Session] Could not record item {}: {}", item, e),
                }
            }
        }

        if let Some(next) = PhaseEngine::on_response(self.phase, &parsed) {
            self.enter(next);
            effects.entered_phase = Some(next);
        } else {
            self.current_item = PhaseEngine::current_item(self.phase, &self.protocol);
        }

        self.conversation
            .append(MessageRole::Assistant, parsed.clean_text);
        effects
    }

    /// Records the value of an item belonging to the active phase.
    ///
    /// # Errors
    ///
    /// - `ItemOutOfPhase` unless the session is in the phase that owns `item`
    /// - `FieldLocked` when blanking an item that already holds a value
    pub fn record_item(&mut self, item: ItemId, value: impl Into<String>) -> Result<()> {
        if self.phase.item_set() != Some(item.set()) {
            return Err(TtdError::ItemOutOfPhase {
                key: item.key().to_string(),
                phase: self.phase.to_string(),
            });
        }
        self.protocol.set_item(item, value)
    }

    /// Appends an assistant message that bypasses marker handling.
    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.conversation.append(MessageRole::Assistant, text);
    }

    /// Returns to a fresh seeded session.
    pub fn reset(&mut self) {
        self.protocol.clear();
        self.phase = Phase::Introduction;
        self.current_item = None;
        self.conversation.replace(Vec::new());
        self.conversation
            .append(MessageRole::Assistant, WELCOME_MESSAGE);
    }

    fn enter(&mut self, next: Phase) {
        if next <= self.phase {
            return;
        }
        tracing::info!("[Session] Phase {} -> {}", self.phase, next);
        self.phase = next;
        self.current_item = PhaseEngine::current_item(next, &self.protocol);
    }
}

/// A captured copy of a session, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session: Session,
    /// Capture time, Unix milliseconds.
    pub captured_at: i64,
}

impl Snapshot {
    pub fn capture(session: &Session) -> Self {
        Self {
            session: session.clone(),
            captured_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
