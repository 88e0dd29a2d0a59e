//! Protocol use case implementation.
//!
//! `ProtocolUseCase` owns the running session and drives one conversation
//! turn at a time: record the researcher's message, build the instruction
//! context, call the assistant, apply markers, and persist in the background.

use chrono::{Local, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use ttd_core::assistant::{AssistantClient, AssistantError, CompletionRequest};
use ttd_core::config::AssistantConfig;
use ttd_core::context::build_context;
use ttd_core::document::{self, ExportedDocument};
use ttd_core::error::TtdError;
use ttd_core::export::{DocumentSink, ExportTarget};
use ttd_core::phase::Phase;
use ttd_core::protocol::{ItemId, ItemSet};
use ttd_core::session::Session;
use ttd_infrastructure::snapshot_gateway::{SaveStatus, SnapshotGateway};

/// Why a submission was not processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A request is already in progress")]
    Busy,

    #[error(transparent)]
    Session(#[from] TtdError),
}

/// Result of a processed turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The assistant answered; `reply` is the stored, marker-free text.
    Replied {
        reply: String,
        entered_phase: Option<Phase>,
        recorded_items: Vec<ItemId>,
    },
    /// The assistant call failed; `apology` was appended to the conversation.
    Failed {
        apology: String,
        error: AssistantError,
    },
}

impl TurnOutcome {
    /// Text appended to the conversation for this turn.
    pub fn message(&self) -> &str {
        match self {
            TurnOutcome::Replied { reply, .. } => reply,
            TurnOutcome::Failed { apology, .. } => apology,
        }
    }
}

/// A failed export, with advice to use the other export path.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", target.fallback_hint())]
pub struct ExportFailure {
    pub target: ExportTarget,
    pub reason: String,
}

/// Snapshot of how far the protocol has come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    pub current_item: Option<ItemId>,
    pub research_question: String,
    /// Each specification item with its completion flag, in order.
    pub specification: Vec<(ItemId, bool)>,
    /// Each emulation item with its completion flag, in order.
    pub emulation: Vec<(ItemId, bool)>,
}

/// Releases the in-flight flag when a turn or reset ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ProtocolUseCase {
    session: RwLock<Session>,
    gateway: SnapshotGateway,
    assistant: Arc<dyn AssistantClient>,
    model: String,
    max_tokens: u32,
    in_flight: AtomicBool,
    /// Bumped on every session mutation; keys the document cache.
    revision: AtomicU64,
    document_cache: Mutex<Option<(u64, ExportedDocument)>>,
}

impl ProtocolUseCase {
    /// Creates a use case holding an empty session.
    ///
    /// Call [`restore_or_start`](Self::restore_or_start) before the first turn.
    pub fn new(
        gateway: SnapshotGateway,
        assistant: Arc<dyn AssistantClient>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            session: RwLock::new(Session::default()),
            gateway,
            assistant,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            in_flight: AtomicBool::new(false),
            revision: AtomicU64::new(0),
            document_cache: Mutex::new(None),
        }
    }

    /// Loads the stored session, or starts a fresh one with the welcome message.
    ///
    /// Returns `true` when a stored session was restored.
    pub async fn restore_or_start(&self) -> bool {
        let restored = self.gateway.load().await;
        let mut session = self.session.write().await;

        let was_restored = match restored {
            Some(stored) if !stored.messages().is_empty() => {
                tracing::info!(
                    "[ProtocolUseCase] Restored session in phase {} with {} messages",
                    stored.phase,
                    stored.messages().len()
                );
                *session = stored;
                true
            }
            _ => {
                tracing::info!("[ProtocolUseCase] Starting a new session");
                *session = Session::seeded();
                self.gateway.spawn_save(&session);
                false
            }
        };

        self.bump_revision();
        was_restored
    }

    /// Processes one researcher message.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` for blank input
    /// - `Busy` while another turn is waiting for the assistant or a reset runs
    ///
    /// Assistant failures are not errors: they produce `TurnOutcome::Failed`
    /// with an apology appended to the conversation.
    pub async fn submit(&self, input: &str) -> Result<TurnOutcome, TurnError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }
        let _guard = self.begin().inspect_err(|_| {
            tracing::debug!("[ProtocolUseCase] Rejecting submission while busy");
        })?;

        let request = {
            let mut session = self.session.write().await;
            if let Some(phase) = session.record_researcher_message(text)? {
                tracing::info!(
                    "[ProtocolUseCase] Research question recorded; entered {}",
                    phase
                );
            }
            self.bump_revision();
            self.gateway.spawn_save(&session);

            let system = build_context(session.phase, session.current_item, &session.protocol);
            CompletionRequest::new(system, session.messages())
                .with_model(self.model.clone())
                .with_max_tokens(self.max_tokens)
        };

        let response = self.assistant.complete(request).await;

        let mut session = self.session.write().await;
        let outcome = match response {
            Ok(raw) => {
                let effects = session.apply_assistant_response(&raw);
                for item in &effects.recorded_items {
                    tracing::info!("[ProtocolUseCase] Recorded item {}", item.code());
                }
                if let Some(phase) = effects.entered_phase {
                    tracing::info!("[ProtocolUseCase] Entered phase {}", phase);
                }
                TurnOutcome::Replied {
                    reply: effects.clean_text,
                    entered_phase: effects.entered_phase,
                    recorded_items: effects.recorded_items,
                }
            }
            Err(error) => {
                tracing::error!("[ProtocolUseCase] Assistant request failed: {}", error);
                let apology = format!(
                    "I apologize, but I encountered an error: {}. Please try again.",
                    error
                );
                session.append_assistant_message(apology.clone());
                TurnOutcome::Failed { apology, error }
            }
        };
        self.bump_revision();
        self.gateway.spawn_save(&session);

        Ok(outcome)
    }

    /// Discards the session and starts over with only the welcome message.
    ///
    /// Holds the in-flight flag until the reset is finished, so no turn can
    /// start against the session being discarded. Failing to delete the stored
    /// snapshot does not stop the reset.
    pub async fn reset(&self) -> Result<(), TurnError> {
        let _guard = self.begin()?;

        self.gateway.clear().await;

        let mut session = self.session.write().await;
        session.reset();
        self.bump_revision();
        self.gateway.spawn_save(&session);

        tracing::info!("[ProtocolUseCase] Session reset");
        Ok(())
    }

    /// The export document for the current session.
    ///
    /// Unchanged sessions return the same document, so repeated exports are
    /// byte-identical.
    pub async fn document(&self) -> ExportedDocument {
        let session = self.session.read().await;
        let revision = self.revision.load(Ordering::SeqCst);

        let mut cache = self.document_cache.lock().await;
        if let Some((cached_revision, cached)) = cache.as_ref() {
            if *cached_revision == revision {
                return cached.clone();
            }
        }

        let exported = ExportedDocument {
            file_name: document::file_name(Utc::now().timestamp_millis()),
            content: document::assemble(&session, &Local::now()),
        };
        *cache = Some((revision, exported.clone()));
        exported
    }

    /// Delivers the current document to `sink`.
    ///
    /// Returns where the document went.
    pub async fn export(&self, sink: &dyn DocumentSink) -> Result<String, ExportFailure> {
        let exported = self.document().await;
        sink.deliver(&exported).await.map_err(|e| {
            tracing::error!("[ProtocolUseCase] Export to {:?} failed: {}", sink.target(), e);
            ExportFailure {
                target: sink.target(),
                reason: e.to_string(),
            }
        })
    }

    pub async fn phase(&self) -> Phase {
        self.session.read().await.phase
    }

    pub async fn phase_label(&self) -> &'static str {
        self.phase().await.label()
    }

    pub async fn progress(&self) -> Progress {
        let session = self.session.read().await;
        let flags = |set: ItemSet| -> Vec<(ItemId, bool)> {
            set.items()
                .iter()
                .map(|item| (*item, session.protocol.is_complete(*item)))
                .collect()
        };
        Progress {
            phase: session.phase,
            current_item: session.current_item,
            research_question: session.protocol.research_question().to_string(),
            specification: flags(ItemSet::Specification),
            emulation: flags(ItemSet::Emulation),
        }
    }

    pub async fn save_status(&self) -> SaveStatus {
        self.gateway.status().await
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits for background saves requested so far.
    pub async fn flush_saves(&self) {
        self.gateway.flush().await;
    }

    /// Claims the in-flight flag for a turn or a reset.
    fn begin(&self) -> Result<InFlightGuard<'_>, TurnError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TurnError::Busy)?;
        Ok(InFlightGuard(&self.in_flight))
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}
