//! Best-effort persistence of the session snapshot.
//!
//! The gateway never returns persistence errors to its callers. Failures are
//! logged and reflected in the observable [`SaveStatus`].

use crate::dto::{SNAPSHOT_ENTITY, create_snapshot_migrator};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use ttd_core::error::{Result, TtdError};
use ttd_core::session::{KeyValueStore, SESSION_KEY, Session, Snapshot};

/// Outcome of the most recent persistence operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }
}

/// Saves, loads and clears the single session snapshot.
///
/// Every save is stamped with a generation number when it is requested. Writes
/// are serialized and a save older than the last applied write is skipped, so
/// the stored snapshot always reflects the most recently requested state.
#[derive(Clone)]
pub struct SnapshotGateway {
    store: Arc<dyn KeyValueStore>,
    status: Arc<RwLock<SaveStatus>>,
    next_generation: Arc<AtomicU64>,
    /// Generation of the last write (or delete) applied to the store.
    applied: Arc<Mutex<u64>>,
    pending: Arc<AtomicUsize>,
    settled: Arc<Notify>,
}

impl SnapshotGateway {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            status: Arc::new(RwLock::new(SaveStatus::Idle)),
            next_generation: Arc::new(AtomicU64::new(1)),
            applied: Arc::new(Mutex::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
            settled: Arc::new(Notify::new()),
        }
    }

    pub async fn status(&self) -> SaveStatus {
        *self.status.read().await
    }

    /// Persists `session` and waits for the write to finish.
    ///
    /// Sessions without messages are not persisted.
    pub async fn save(&self, session: &Session) {
        if session.messages().is_empty() {
            return;
        }
        let generation = self.take_generation();
        self.write_snapshot(generation, Snapshot::capture(session))
            .await;
    }

    /// Persists `session` on a background task.
    ///
    /// The snapshot is captured before this returns, so saves requested in
    /// order are applied in order. The handle may be awaited or dropped.
    pub fn spawn_save(&self, session: &Session) -> JoinHandle<()> {
        let gateway = self.clone();
        if session.messages().is_empty() {
            return tokio::spawn(async {});
        }
        let generation = self.take_generation();
        let snapshot = Snapshot::capture(session);
        self.pending.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            gateway.write_snapshot(generation, snapshot).await;
            gateway.pending.fetch_sub(1, Ordering::SeqCst);
            gateway.settled.notify_waiters();
        })
    }

    /// Loads the stored session.
    ///
    /// Returns `None` when nothing is stored, when the store fails, or when the
    /// stored data cannot be decoded.
    pub async fn load(&self) -> Option<Session> {
        let raw = match self.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("[SnapshotGateway] No stored snapshot");
                return None;
            }
            Err(e) => {
                tracing::error!("[SnapshotGateway] Failed to read snapshot: {}", e);
                self.set_status(SaveStatus::Error).await;
                return None;
            }
        };

        match Self::decode(&raw) {
            Ok(snapshot) => {
                tracing::info!(
                    "[SnapshotGateway] Restored snapshot captured at {} ({} messages, phase {})",
                    snapshot.captured_at,
                    snapshot.session.messages().len(),
                    snapshot.session.phase
                );
                Some(snapshot.session)
            }
            Err(e) => {
                tracing::warn!("[SnapshotGateway] Ignoring malformed snapshot: {}", e);
                None
            }
        }
    }

    /// Deletes the stored snapshot.
    ///
    /// Saves requested before this call are not applied afterwards.
    pub async fn clear(&self) {
        let generation = self.take_generation();
        let mut applied = self.applied.lock().await;
        *applied = (*applied).max(generation);

        if let Err(e) = self.store.delete(SESSION_KEY).await {
            tracing::error!("[SnapshotGateway] Failed to clear snapshot: {}", e);
            self.set_status(SaveStatus::Error).await;
        }
    }

    /// Waits until every save requested so far has been applied or skipped.
    pub async fn flush(&self) {
        loop {
            let settled = self.settled.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                break;
            }
            settled.await;
        }
    }

    pub fn encode(snapshot: &Snapshot) -> Result<String> {
        let migrator = create_snapshot_migrator();
        Ok(migrator.save_domain_flat(SNAPSHOT_ENTITY, snapshot)?)
    }

    pub fn decode(raw: &str) -> Result<Snapshot> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(TtdError::Serialization {
                format: "JSON".to_string(),
                message: "snapshot is not an object".to_string(),
            });
        }
        let migrator = create_snapshot_migrator();
        Ok(migrator.load_flat_from(SNAPSHOT_ENTITY, value)?)
    }

    fn take_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    async fn write_snapshot(&self, generation: u64, snapshot: Snapshot) {
        let mut applied = self.applied.lock().await;
        if generation < *applied {
            tracing::debug!(
                "[SnapshotGateway] Skipping stale save {} (applied {})",
                generation,
                *applied
            );
            return;
        }

        self.set_status(SaveStatus::Saving).await;

        let result = match Self::encode(&snapshot) {
            Ok(encoded) => self.store.set(SESSION_KEY, encoded).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                *applied = generation;
                self.set_status(SaveStatus::Saved).await;
            }
            Err(e) => {
                tracing::error!("[SnapshotGateway] Failed to save snapshot: {}", e);
                self.set_status(SaveStatus::Error).await;
            }
        }
    }

    async fn set_status(&self, status: SaveStatus) {
        *self.status.write().await = status;
    }
}
