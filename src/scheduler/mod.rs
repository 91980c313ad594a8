//! Expiry scheduling.
//!
//! # Data Flow
//! ```text
//! relay controller
//!     → arm(id, expires_at)  (replaces any pending timer for the id)
//!     → spawned sleep task
//!     → ExpiryFired { id, generation } over mpsc
//!     → relay controller's single expiry path
//! ```
//!
//! # Design Decisions
//! - Timers never write to the store or broadcast; they only emit a
//!   message. Persistence and fan-out stay in one place regardless of
//!   trigger source.
//! - At most one pending timer per id; arming supersedes.
//! - Each armed timer carries a generation. A fire is acted on only if
//!   its generation is still the live one, so a timer racing a reissue
//!   can never produce a stale expiry.
//! - Arming an already-past instant cancels any prior timer but
//!   schedules nothing; overdue rows are excluded by the startup query
//!   instead of fired immediately.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notification that an armed timer reached its expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryFired {
    pub id: String,
    pub generation: u64,
}

#[derive(Debug)]
struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// One pending expiry timer per active warning.
#[derive(Debug)]
pub struct ExpiryScheduler {
    timers: DashMap<String, TimerEntry>,
    fired_tx: mpsc::UnboundedSender<ExpiryFired>,
    generations: AtomicU64,
}

impl ExpiryScheduler {
    /// Create a scheduler and the channel its timers fire into.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExpiryFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: DashMap::new(),
                fired_tx,
                generations: AtomicU64::new(0),
            },
            fired_rx,
        )
    }

    /// Schedule a one-shot expiry for `id` at `expires_at`, replacing
    /// any pending timer for the same id.
    pub fn arm(&self, id: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.disarm(id);

        let delay = match (expires_at - now).to_std() {
            Ok(delay) => delay,
            // Already past: the caller's queries exclude overdue rows,
            // and firing here would race bootstrap.
            Err(_) => return,
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let fired_tx = self.fired_tx.clone();
        let timer_id = id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(ExpiryFired {
                id: timer_id,
                generation,
            });
        });

        tracing::debug!(id = %id, expires_at = %expires_at, generation, "Expiry timer armed");
        self.timers.insert(id.to_string(), TimerEntry { generation, handle });
    }

    /// Cancel the pending timer for `id`; no-op if none.
    pub fn disarm(&self, id: &str) {
        if let Some((_, entry)) = self.timers.remove(id) {
            entry.handle.abort();
            tracing::debug!(id = %id, generation = entry.generation, "Expiry timer disarmed");
        }
    }

    /// Consume the pending timer for `id` if `generation` is still the
    /// live one. Returns false for fires superseded by a later arm or a
    /// disarm; such fires must be dropped.
    pub fn take_if_current(&self, id: &str, generation: u64) -> bool {
        self.timers
            .remove_if(id, |_, entry| entry.generation == generation)
            .is_some()
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Abort every pending timer without firing. Timers are rebuilt
    /// from the store on next startup, so nothing durable is lost.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.disarm(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    #[tokio::test]
    async fn fire_delivers_exactly_one_message() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now + ChronoDuration::milliseconds(20), now);

        let fired = tokio::time::timeout(Duration::from_secs(1), fired_rx.recv())
            .await
            .expect("timer should fire")
            .expect("channel open");
        assert_eq!(fired.id, "W1");
        assert!(scheduler.take_if_current("W1", fired.generation));

        // Nothing else pending, nothing else fires.
        assert_eq!(scheduler.pending(), 0);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), fired_rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn rearm_supersedes_pending_timer() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now + ChronoDuration::milliseconds(20), now);
        scheduler.arm("W1", now + ChronoDuration::milliseconds(80), now);
        assert_eq!(scheduler.pending(), 1);

        let fired = tokio::time::timeout(Duration::from_secs(1), fired_rx.recv())
            .await
            .expect("replacement timer should fire")
            .expect("channel open");
        // Only the replacement generation is accepted.
        assert!(scheduler.take_if_current("W1", fired.generation));
        assert!(!scheduler.take_if_current("W1", fired.generation - 1));
    }

    #[tokio::test]
    async fn stale_generation_is_rejected() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now + ChronoDuration::milliseconds(10), now);

        let fired = fired_rx.recv().await.expect("fire");
        // A reissue lands between the fire and its processing.
        scheduler.arm("W1", now + ChronoDuration::minutes(30), now);

        assert!(!scheduler.take_if_current(&fired.id, fired.generation));
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn disarm_cancels_and_is_idempotent() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now + ChronoDuration::milliseconds(30), now);
        scheduler.disarm("W1");
        scheduler.disarm("W1");
        assert_eq!(scheduler.pending(), 0);

        assert!(
            tokio::time::timeout(Duration::from_millis(120), fired_rx.recv())
                .await
                .is_err(),
            "disarmed timer must not fire"
        );
    }

    #[tokio::test]
    async fn past_instants_never_fire() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now - ChronoDuration::minutes(5), now);
        assert_eq!(scheduler.pending(), 0);

        assert!(
            tokio::time::timeout(Duration::from_millis(50), fired_rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn shutdown_aborts_all_pending() {
        let (scheduler, mut fired_rx) = ExpiryScheduler::new();
        let now = Utc::now();
        scheduler.arm("W1", now + ChronoDuration::milliseconds(20), now);
        scheduler.arm("W2", now + ChronoDuration::milliseconds(20), now);
        scheduler.shutdown();
        assert_eq!(scheduler.pending(), 0);

        assert!(
            tokio::time::timeout(Duration::from_millis(100), fired_rx.recv())
                .await
                .is_err()
        );
    }
}
