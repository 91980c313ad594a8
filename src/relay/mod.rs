//! Warning lifecycle controller.
//!
//! # Data Flow
//! ```text
//! WebSocket frame ─┐
//! TCP line ────────┼→ handle_inbound() → issue() / expire()
//! timer channel ───┘                         │
//!                                            ▼
//!                          per-id lock → store write → scheduler
//!                                            │
//!                                            ▼
//!                              fan-out gate → broadcast to all
//! ```
//!
//! # Design Decisions
//! - One expiry path: the scheduler's fire messages and manual expire
//!   commands converge here, under the same per-id lock.
//! - Persisted-then-announced: the store write completes before a timer
//!   is armed or an event broadcast. A store failure aborts the
//!   transition with nothing announced.
//! - Expire broadcasts only when a row actually transitions
//!   active → inactive, so each activation episode emits at most one.
//! - Attach holds the gate exclusively while snapshotting and
//!   registering, so a bootstrap is always the subscriber's first frame.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::errors::{RelayError, RelayResult};
use crate::fanout::{FanOut, SubscriberId, TransportKind};
use crate::model::{IssueCommand, Warning};
use crate::observability::metrics;
use crate::protocol::{self, ClientCommand, ServerEvent};
use crate::scheduler::{ExpiryFired, ExpiryScheduler};
use crate::store::WarningStore;

/// Validates commands, writes through the store, arms the scheduler,
/// and triggers fan-out. Owns the per-id serialization discipline.
pub struct RelayController {
    store: WarningStore,
    scheduler: ExpiryScheduler,
    fanout: FanOut,
    /// Per-id lock arena: transitions on one id are mutually exclusive,
    /// different ids proceed in parallel.
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Broadcasts take read, subscriber attachment takes write: a new
    /// subscriber's snapshot can never interleave with a broadcast.
    attach_gate: RwLock<()>,
}

impl RelayController {
    pub fn new(store: WarningStore, scheduler: ExpiryScheduler, fanout: FanOut) -> Self {
        Self {
            store,
            scheduler,
            fanout,
            locks: DashMap::new(),
            attach_gate: RwLock::new(()),
        }
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(id.to_string()).or_default().clone()
    }

    /// Decode and dispatch a raw frame from either transport.
    ///
    /// Validation failures are reported to the originating subscriber
    /// only; undecodable frames are logged and dropped.
    pub async fn handle_inbound(&self, transport: TransportKind, subscriber: SubscriberId, raw: &str) {
        match protocol::decode_command(raw) {
            Ok(ClientCommand::Issue(command)) => {
                if let Err(e) = self.issue(command, transport).await {
                    self.report_error(transport, subscriber, &e);
                }
            }
            Ok(ClientCommand::Expire { id }) => {
                if let Err(e) = self.expire(&id, transport).await {
                    self.report_error(transport, subscriber, &e);
                }
            }
            Err(e) => {
                tracing::warn!(transport = %transport, subscriber = %subscriber, error = %e, "Dropping malformed frame");
            }
        }
    }

    /// Issue (or re-issue) a warning: validate, persist, arm, announce.
    pub async fn issue(&self, command: IssueCommand, source: TransportKind) -> RelayResult<Warning> {
        let warning = command.into_warning(Utc::now())?;

        let lock = self.lock_for(&warning.id);
        let _guard = lock.lock().await;

        if let Err(e) = self.store.upsert(&warning).await {
            tracing::error!(id = %warning.id, error = %e, "Issue aborted, warning not persisted");
            return Err(e);
        }
        self.scheduler.arm(&warning.id, warning.expires_at, Utc::now());

        tracing::info!(
            id = %warning.id,
            kind = %warning.kind,
            expires_at = %warning.expires_at,
            source = %source,
            "Warning issued"
        );
        metrics::record_issue();

        self.broadcast(ServerEvent::Issue {
            warning: warning.clone(),
        })
        .await;
        Ok(warning)
    }

    /// Manually expire a warning. Idempotent: expiring an unknown or
    /// already-inactive id is a quiet no-op.
    pub async fn expire(&self, id: &str, source: TransportKind) -> RelayResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let transitioned = self.store.mark_inactive(id).await?;
        self.scheduler.disarm(id);
        if !transitioned {
            tracing::debug!(id = %id, source = %source, "Expire command for inactive id ignored");
            return Ok(());
        }

        tracing::info!(id = %id, source = %source, "Warning expired");
        metrics::record_expire("command");

        self.broadcast(ServerEvent::Expire { id: id.to_string() }).await;
        Ok(())
    }

    /// Process one timer fire. Stale fires (superseded by a reissue or
    /// manual expire) are dropped without a trace beyond a debug log.
    pub async fn handle_fired(&self, fired: ExpiryFired) {
        let lock = self.lock_for(&fired.id);
        let _guard = lock.lock().await;

        if !self.scheduler.take_if_current(&fired.id, fired.generation) {
            tracing::debug!(id = %fired.id, generation = fired.generation, "Superseded timer fire dropped");
            return;
        }

        match self.store.mark_inactive(&fired.id).await {
            Ok(true) => {
                tracing::info!(id = %fired.id, "Warning expired");
                metrics::record_expire("timer");
                self.broadcast(ServerEvent::Expire { id: fired.id }).await;
            }
            Ok(false) => {
                tracing::debug!(id = %fired.id, "Timer fired for already-inactive id");
            }
            Err(e) => {
                // Timer entry is already consumed: no in-process retry
                // loop. The row stays active and the next startup
                // reconciliation self-corrects.
                tracing::error!(id = %fired.id, error = %e, "Expiry persistence failed");
            }
        }
    }

    /// Rebuild the timer set from storage after a restart.
    pub async fn restore(&self) -> RelayResult<usize> {
        let now = Utc::now();
        let active = self.store.list_active(now).await?;
        let count = active.len();
        for warning in active {
            self.scheduler.arm(&warning.id, warning.expires_at, now);
        }
        Ok(count)
    }

    /// Register a new subscriber and send its bootstrap snapshot.
    ///
    /// The exclusive gate guarantees the snapshot is the first frame the
    /// subscriber receives and matches the store's active set at
    /// connection time.
    pub async fn attach(
        &self,
        transport: TransportKind,
        tx: mpsc::UnboundedSender<String>,
    ) -> RelayResult<SubscriberId> {
        let _gate = self.attach_gate.write().await;

        let warnings = self.store.list_active(Utc::now()).await?;
        let line = serde_json::to_string(&ServerEvent::Bootstrap { warnings })?;

        let id = SubscriberId::new();
        let registry = self.fanout.registry(transport);
        registry.add(id, tx);
        registry.send(id, &line);
        Ok(id)
    }

    /// Remove a subscriber from its transport registry.
    pub fn detach(&self, transport: TransportKind, id: SubscriberId) {
        self.fanout.registry(transport).remove(id);
    }

    /// Warnings issued on the given calendar date, ascending.
    pub async fn warnings_issued_on(&self, date: NaiveDate) -> RelayResult<Vec<Warning>> {
        self.store.list_by_issue_date(date).await
    }

    /// Send a validation report to the originating subscriber only.
    fn report_error(&self, transport: TransportKind, subscriber: SubscriberId, error: &RelayError) {
        tracing::warn!(transport = %transport, subscriber = %subscriber, error = %error, "Command rejected");
        match serde_json::to_string(&ServerEvent::Error {
            message: error.to_string(),
        }) {
            Ok(line) => {
                self.fanout.registry(transport).send(subscriber, &line);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode error report"),
        }
    }

    /// Serialize once and deliver to every subscriber on both
    /// transports, ordered after any in-flight attach.
    async fn broadcast(&self, event: ServerEvent) {
        let _gate = self.attach_gate.read().await;
        match serde_json::to_string(&event) {
            Ok(line) => self.fanout.broadcast_all(&line),
            Err(e) => tracing::error!(error = %e, "Failed to encode event"),
        }
    }

    /// Abort all pending timers; nothing further is written. Timers are
    /// rebuilt from the store on next startup.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// Drive the single expiry path from the scheduler's fire channel
    /// until shutdown.
    pub fn spawn_expiry_loop(
        controller: Arc<Self>,
        mut fired_rx: mpsc::UnboundedReceiver<ExpiryFired>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    fired = fired_rx.recv() => match fired {
                        Some(fired) => controller.handle_fired(fired).await,
                        None => break,
                    },
                }
            }
            tracing::debug!("Expiry loop stopped");
        })
    }
}
