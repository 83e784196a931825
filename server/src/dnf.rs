//! Delayed did-not-finish (DNF) countdown scheduling
//!
//! When a session's winner crosses the line, every straggler gets a pending
//! kick entry: "stamp this player's record with the DNF code at now+delay,
//! unless they finish on their own first". The per-pair state machine is
//!
//! ```text
//! None -> Pending -> { Fired | Canceled }
//! ```
//!
//! The transition out of Pending is arbitrated by the entry table's lock:
//! `claim_fire` and `cancel` both remove the entry, so exactly one of them
//! can ever win for a given countdown. A stale sleep task whose entry was
//! canceled (or re-armed under a newer token) loses its claim and becomes a
//! no-op.
//!
//! Sleep tasks do not mutate records themselves. They post a [`DnfElapsed`]
//! message on the scheduler's channel and the main loop drives the actual
//! record mutation through the arbiter, keeping all record writes on one
//! code path.

use log::debug;
use shared::{PersonaId, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Posted on the scheduler channel when a countdown elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnfElapsed {
    pub session_id: SessionId,
    pub persona_id: PersonaId,
    pub token: u64,
}

struct PendingDnf {
    token: u64,
    deadline_ms: u64,
}

pub struct DnfScheduler {
    delay: Duration,
    tx: mpsc::UnboundedSender<DnfElapsed>,
    next_token: AtomicU64,
    pending: Mutex<HashMap<(SessionId, PersonaId), PendingDnf>>,
}

impl DnfScheduler {
    /// Creates the scheduler plus the receiving end of its elapsed-timer
    /// channel; the caller's main loop owns the receiver.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<DnfElapsed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            DnfScheduler {
                delay,
                tx,
                next_token: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
            },
            rx,
        )
    }

    /// Countdown length handed to clients in the timing-out notification.
    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// Arms a countdown for (session, player). If one is already pending
    /// the existing entry is left untouched — at most one kick per pair.
    /// Returns whether a new countdown was armed.
    pub fn arm(&self, session_id: SessionId, persona_id: PersonaId) -> bool {
        let token = {
            let mut pending = self.pending.lock().unwrap();
            if pending.contains_key(&(session_id, persona_id)) {
                return false;
            }
            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            pending.insert(
                (session_id, persona_id),
                PendingDnf {
                    token,
                    deadline_ms: crate::utils::deadline_ms(self.delay),
                },
            );
            token
        };

        debug!(
            "armed DNF countdown for persona {} in session {} (token {})",
            persona_id, session_id, token
        );

        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the server is shutting down.
            let _ = tx.send(DnfElapsed {
                session_id,
                persona_id,
                token,
            });
        });
        true
    }

    /// Cancels a pending countdown; a player who finished normally must
    /// never be stamped with the DNF code. Canceling a pair that is not
    /// pending (never armed, already claimed) is a no-op.
    pub fn cancel(&self, session_id: SessionId, persona_id: PersonaId) -> bool {
        let removed = self
            .pending
            .lock()
            .unwrap()
            .remove(&(session_id, persona_id))
            .is_some();
        if removed {
            debug!(
                "canceled DNF countdown for persona {} in session {}",
                persona_id, session_id
            );
        }
        removed
    }

    /// Claims the Pending -> Fired transition for an elapsed countdown.
    /// Fails if the entry was canceled in the meantime or the token is
    /// stale; the losing side must treat the claim as a no-op.
    pub fn claim_fire(&self, session_id: SessionId, persona_id: PersonaId, token: u64) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.get(&(session_id, persona_id)) {
            Some(entry) if entry.token == token => {
                pending.remove(&(session_id, persona_id));
                true
            }
            _ => false,
        }
    }

    /// Whether a countdown is currently pending for the pair.
    pub fn is_pending(&self, session_id: SessionId, persona_id: PersonaId) -> bool {
        self.pending
            .lock()
            .unwrap()
            .contains_key(&(session_id, persona_id))
    }

    /// Wall-clock deadline of a pending countdown, if any.
    pub fn deadline(&self, session_id: SessionId, persona_id: PersonaId) -> Option<u64> {
        self.pending
            .lock()
            .unwrap()
            .get(&(session_id, persona_id))
            .map(|entry| entry.deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn arming_twice_keeps_the_first_countdown() {
        let (scheduler, _rx) = DnfScheduler::new(Duration::from_secs(60));

        assert!(scheduler.arm(1, 10));
        let first_deadline = scheduler.deadline(1, 10).unwrap();
        assert!(!scheduler.arm(1, 10));
        assert_eq!(scheduler.deadline(1, 10), Some(first_deadline));
    }

    #[tokio::test]
    async fn cancel_before_fire_wins() {
        let (scheduler, _rx) = DnfScheduler::new(Duration::from_secs(60));
        scheduler.arm(1, 10);

        assert!(scheduler.cancel(1, 10));
        assert!(!scheduler.is_pending(1, 10));
        // The sleep task's eventual claim loses.
        assert!(!scheduler.claim_fire(1, 10, 1));
    }

    #[tokio::test]
    async fn cancel_after_claim_is_a_noop() {
        let (scheduler, _rx) = DnfScheduler::new(Duration::from_secs(60));
        scheduler.arm(1, 10);

        assert!(scheduler.claim_fire(1, 10, 1));
        assert!(!scheduler.cancel(1, 10));
    }

    #[tokio::test]
    async fn stale_token_cannot_claim_a_rearmed_countdown() {
        let (scheduler, _rx) = DnfScheduler::new(Duration::from_secs(60));
        scheduler.arm(1, 10);
        scheduler.cancel(1, 10);
        scheduler.arm(1, 10);

        // Token 1 belonged to the canceled countdown; token 2 is live.
        assert!(!scheduler.claim_fire(1, 10, 1));
        assert!(scheduler.claim_fire(1, 10, 2));
    }

    #[tokio::test]
    async fn elapsed_countdown_posts_on_the_channel() {
        let (scheduler, mut rx) = DnfScheduler::new(Duration::from_millis(10));
        scheduler.arm(4, 40);

        let elapsed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for DNF message")
            .expect("scheduler channel closed");
        assert_eq!(elapsed.session_id, 4);
        assert_eq!(elapsed.persona_id, 40);
        assert!(scheduler.claim_fire(elapsed.session_id, elapsed.persona_id, elapsed.token));
    }

    /// Forced interleaving of the central race: fire and cancel contending
    /// for the same pending entry from two threads. Exactly one must win,
    /// every iteration.
    #[tokio::test]
    async fn fire_and_cancel_have_exactly_one_winner() {
        let (scheduler, _rx) = DnfScheduler::new(Duration::from_secs(60));
        let scheduler = Arc::new(scheduler);

        for round in 0..200u64 {
            scheduler.arm(9, 90);
            let token = round + 1;

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let firing = {
                let scheduler = Arc::clone(&scheduler);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    scheduler.claim_fire(9, 90, token)
                })
            };
            let canceling = {
                let scheduler = Arc::clone(&scheduler);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    scheduler.cancel(9, 90)
                })
            };

            let fired = firing.join().unwrap();
            let canceled = canceling.join().unwrap();
            assert!(
                fired ^ canceled,
                "round {}: fired={} canceled={}",
                round,
                fired,
                canceled
            );
            assert!(!scheduler.is_pending(9, 90));
        }
    }
}
