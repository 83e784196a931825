//! Arbitration dispatch: the authoritative result path for race sessions
//!
//! Every mode goes through the same pipeline here: ownership check, session
//! resolution, per-player record lock, handler merge, persistence, scoring
//! triggers, aggregate outcome assembly, notification fan-out, and DNF
//! arming. Mode handlers only merge telemetry; everything cross-cutting
//! lives in this module so the invariants hold for all modes uniformly.
//!
//! The unit of mutual exclusion is the (session, player) race record: a
//! lock table serializes its read-modify-write so concurrent duplicate
//! submissions have exactly one winner, and the DNF fire path contends on
//! the same lock. Sessions never contend with each other.

use crate::dnf::DnfScheduler;
use crate::error::EngineError;
use crate::matchmaking::MatchmakingQueue;
use crate::modes::{HandlerTable, ModeHandler, PursuitHandler};
use crate::notify::Notifier;
use crate::scoring::{AchievementEventContext, ScoreContext, ScoreEvent, ScoringTriggers};
use crate::store::{RaceRecord, Session, SessionStore};
use crate::utils::get_timestamp;
use log::{debug, error, info, trace, warn};
use shared::{
    DamageSummary, EntrantSummary, Outcome, PersonaId, RaceEvent, RewardSummary, SessionId,
    Telemetry, FINISH_DNF,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

/// Ownership/identity check delegated to the session-token collaborator.
/// The engine refuses to mutate anything when this fails.
pub trait OwnershipVerifier: Send + Sync {
    fn verify(&self, persona_id: PersonaId, session_id: SessionId) -> Result<(), EngineError>;
}

/// Stand-in verifier for deployments where the transport has already
/// authenticated the caller.
pub struct AllowAll;

impl OwnershipVerifier for AllowAll {
    fn verify(&self, _persona_id: PersonaId, _session_id: SessionId) -> Result<(), EngineError> {
        Ok(())
    }
}

pub struct Arbiter {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    scoring: ScoringTriggers,
    matchmaking: Arc<MatchmakingQueue>,
    dnf: Arc<DnfScheduler>,
    ownership: Box<dyn OwnershipVerifier>,
    handlers: HandlerTable,
    record_locks: StdMutex<HashMap<(SessionId, PersonaId), Arc<Mutex<()>>>>,
}

impl Arbiter {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        scoring: ScoringTriggers,
        matchmaking: Arc<MatchmakingQueue>,
        dnf: Arc<DnfScheduler>,
        ownership: Box<dyn OwnershipVerifier>,
    ) -> Self {
        Arbiter {
            store,
            notifier,
            scoring,
            matchmaking,
            dnf,
            ownership,
            handlers: HandlerTable::new(),
            record_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Exclusive access to one (session, player) record. Lock entries are
    /// per pair, so racers in other sessions never wait here.
    async fn lock_record(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.record_locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry((session_id, persona_id))
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Marks a player's entry into a session: out of the matchmaking
    /// queue, zeroed tracking row opened.
    pub async fn launch(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<(), EngineError> {
        self.ownership.verify(persona_id, session_id)?;
        self.matchmaking.remove_from_queue(persona_id);
        // Fails NotFound if the lobby never created the session.
        self.store.get_session(session_id).await?;
        self.store.open_race_record(session_id, persona_id).await?;
        info!(
            "persona {} launched into session {}",
            persona_id, session_id
        );
        Ok(())
    }

    /// The arbitration call: merge this player's end-of-race telemetry
    /// into the session and produce the aggregated outcome.
    pub async fn submit(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
        telemetry: &Telemetry,
    ) -> Result<Outcome, EngineError> {
        self.ownership.verify(persona_id, session_id)?;
        let mut session = self.store.get_session(session_id).await?;

        let handler = match self.handlers.get(session.mode) {
            Some(handler) => handler,
            None => {
                // Meeting place: nothing to arbitrate, nothing to mutate.
                debug!(
                    "session {} mode {:?} has no arbitration, returning empty outcome",
                    session_id, session.mode
                );
                return Ok(Outcome::empty(session.event_id, session_id, persona_id));
            }
        };

        self.finish_race(&mut session, persona_id, handler, telemetry, ScoreEvent::Finished)
            .await
    }

    /// Pursuit capture event: same pipeline as `submit`, but the telemetry
    /// must be the pursuit shape regardless of how the session was keyed.
    pub async fn bust(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
        telemetry: &Telemetry,
    ) -> Result<Outcome, EngineError> {
        self.ownership.verify(persona_id, session_id)?;
        if !matches!(telemetry, Telemetry::Pursuit(_)) {
            return Err(EngineError::MalformedRequest(
                "bust requires pursuit telemetry".into(),
            ));
        }
        let mut session = self.store.get_session(session_id).await?;
        self.finish_race(
            &mut session,
            persona_id,
            &PursuitHandler,
            telemetry,
            ScoreEvent::Busted,
        )
        .await
    }

    /// Reserved for future session teardown.
    pub async fn abort(&self, session_id: SessionId) -> Result<(), EngineError> {
        trace!("abort requested for session {}", session_id);
        Ok(())
    }

    async fn finish_race(
        &self,
        session: &mut Session,
        persona_id: PersonaId,
        handler: &dyn ModeHandler,
        telemetry: &Telemetry,
        event: ScoreEvent,
    ) -> Result<Outcome, EngineError> {
        let _guard = self.lock_record(session.id, persona_id).await;

        let mut record = self.store.get_race_record(session.id, persona_id).await?;
        if record.is_final() {
            // Replayed or duplicated submission; the transport is expected
            // to drop this caller.
            warn!(
                "replayed submission for persona {} in session {}",
                persona_id, session.id
            );
            return Err(EngineError::AlreadyCompleted {
                session_id: session.id,
                persona_id,
            });
        }

        handler.merge(session, &mut record, telemetry)?;

        session.ended_at = Some(get_timestamp());
        self.store.update_session(session).await?;
        self.store.update_race_record(&record).await?;

        // A normal result supersedes any countdown armed against this player.
        self.dnf.cancel(session.id, persona_id);

        let (rewards, damage) = self.run_score_triggers(
            persona_id,
            session,
            &record,
            Some(telemetry),
            event,
        );

        let records = self.store.list_race_records(session.id).await?;
        let entrants = self.fan_out(session, &record, &records);

        info!(
            "persona {} finished session {} with reason {} rank {}",
            persona_id, session.id, record.finish_reason, record.rank
        );

        Ok(Outcome {
            event_id: session.event_id,
            session_id: session.id,
            persona_id,
            entrants,
            rewards,
            damage,
        })
    }

    /// Builds the entrant list and notifies the other participants; when
    /// the submitter won a DNF-enabled session, also starts the countdown
    /// for every straggler.
    fn fan_out(
        &self,
        session: &Session,
        submitted: &RaceRecord,
        records: &[RaceRecord],
    ) -> Vec<EntrantSummary> {
        let result_event = RaceEvent::RacerResult {
            session_id: session.id,
            persona_id: submitted.persona_id,
            finish_reason: submitted.finish_reason,
            rank: submitted.rank,
            top_speed: submitted.top_speed,
            duration_ms: submitted.duration_ms,
        };
        let countdown_started = submitted.rank == 1 && session.dnf_enabled;

        let mut entrants = Vec::with_capacity(records.len());
        for racer in records {
            entrants.push(EntrantSummary {
                persona_id: racer.persona_id,
                finish_reason: racer.finish_reason,
                rank: racer.rank,
                top_speed: racer.top_speed,
                duration_ms: racer.duration_ms,
            });

            if racer.persona_id == submitted.persona_id {
                continue;
            }
            self.notifier.notify(racer.persona_id, result_event.clone());
            if countdown_started && !racer.is_final() && self.dnf.arm(session.id, racer.persona_id)
            {
                self.notifier.notify(
                    racer.persona_id,
                    RaceEvent::DnfCountdownStarted {
                        session_id: session.id,
                        countdown_ms: self.dnf.delay_ms(),
                    },
                );
            }
        }
        entrants
    }

    /// Completes an elapsed DNF countdown. Returns `None` when the claim
    /// lost against a normal submission (or a newer countdown) — that is
    /// the expected no-op half of the fire/cancel race.
    pub async fn finalize_dnf(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
        token: u64,
    ) -> Result<Option<Outcome>, EngineError> {
        let _guard = self.lock_record(session_id, persona_id).await;

        if !self.dnf.claim_fire(session_id, persona_id, token) {
            debug!(
                "DNF claim for persona {} in session {} lost, skipping",
                persona_id, session_id
            );
            return Ok(None);
        }

        let mut session = self.store.get_session(session_id).await?;
        let mut record = self.store.get_race_record(session_id, persona_id).await?;
        if record.is_final() {
            // Cancel runs under the record lock, so a claimed entry should
            // never point at a finished record.
            warn!(
                "claimed DNF for persona {} in session {} but record is final",
                persona_id, session_id
            );
            return Ok(None);
        }

        record.finish_reason = FINISH_DNF;
        record.updated_at = get_timestamp();
        session.ended_at = Some(get_timestamp());
        self.store.update_session(&session).await?;
        self.store.update_race_record(&record).await?;

        let (rewards, damage) =
            self.run_score_triggers(persona_id, &session, &record, None, ScoreEvent::Dnf);

        let records = self.store.list_race_records(session_id).await?;
        let entrants = self.fan_out(&session, &record, &records);

        info!(
            "persona {} did not finish session {} before the countdown",
            persona_id, session_id
        );

        Ok(Some(Outcome {
            event_id: session.event_id,
            session_id,
            persona_id,
            entrants,
            rewards,
            damage,
        }))
    }

    /// Invokes the scoring collaborators. Their failures are reported but
    /// never fail the arbitration: dropping a reward is gameplay-visible,
    /// so it is logged loudly, while the race outcome stands.
    fn run_score_triggers(
        &self,
        persona_id: PersonaId,
        session: &Session,
        record: &RaceRecord,
        telemetry: Option<&Telemetry>,
        event: ScoreEvent,
    ) -> (RewardSummary, DamageSummary) {
        let ctx = ScoreContext {
            persona_id,
            session,
            record,
            telemetry,
            event,
        };

        let rewards = match self.scoring.rewards.compute_rewards(&ctx) {
            Ok(summary) => summary,
            Err(e) => {
                error!(
                    "reward computation failed for persona {} in session {}: {}",
                    persona_id, session.id, e
                );
                RewardSummary::default()
            }
        };

        let damage = match self.scoring.damage.compute_damage(&ctx) {
            Ok(summary) => summary,
            Err(e) => {
                error!(
                    "damage computation failed for persona {} in session {}: {}",
                    persona_id, session.id, e
                );
                DamageSummary::default()
            }
        };

        let achievement_ctx = AchievementEventContext {
            session_id: session.id,
            mode: session.mode,
            event,
            rank: record.rank,
            finish_reason: record.finish_reason,
            duration_ms: record.duration_ms,
        };
        if let Err(e) = self
            .scoring
            .achievements
            .update_achievements(persona_id, &achievement_ctx)
        {
            error!(
                "achievement update failed for persona {} in session {}: {}",
                persona_id, session.id, e
            );
        }

        (rewards, damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::scoring::{RewardCalculator, ScoringError};
    use crate::store::InMemorySessionStore;
    use shared::{CommonTelemetry, DragTelemetry, PursuitTelemetry, RaceMode, RouteTelemetry};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        arbiter: Arc<Arbiter>,
        store: Arc<InMemorySessionStore>,
        notifier: Arc<ChannelNotifier>,
        dnf: Arc<DnfScheduler>,
        // Held so armed countdown tasks have a live channel to post on.
        _dnf_rx: mpsc::UnboundedReceiver<crate::dnf::DnfElapsed>,
    }

    fn harness_with(scoring: ScoringTriggers) -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let notifier = Arc::new(ChannelNotifier::new());
        let (dnf, dnf_rx) = DnfScheduler::new(Duration::from_secs(60));
        let dnf = Arc::new(dnf);
        let arbiter = Arc::new(Arbiter::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            scoring,
            Arc::new(MatchmakingQueue::new()),
            Arc::clone(&dnf),
            Box::new(AllowAll),
        ));
        Harness {
            arbiter,
            store,
            notifier,
            dnf,
            _dnf_rx: dnf_rx,
        }
    }

    fn harness() -> Harness {
        harness_with(ScoringTriggers::default())
    }

    async fn seed_session(
        harness: &Harness,
        session_id: SessionId,
        mode: RaceMode,
        dnf_enabled: bool,
        personas: &[PersonaId],
    ) {
        harness
            .store
            .create_session(Session::new(session_id, 900, mode, dnf_enabled))
            .await
            .unwrap();
        for persona in personas {
            harness.arbiter.launch(session_id, *persona).await.unwrap();
        }
    }

    fn drag(finish_reason: u32, rank: u32) -> Telemetry {
        Telemetry::Drag(DragTelemetry {
            common: CommonTelemetry {
                finish_reason,
                rank,
                top_speed: 250.0,
                duration_ms: 30_000,
            },
            fraction_completed: 1.0,
            collision_count: 1,
            longest_jump_ms: 500,
            sum_of_jumps_ms: 700,
            perfect_start: false,
        })
    }

    fn pursuit(finish_reason: u32) -> Telemetry {
        Telemetry::Pursuit(PursuitTelemetry {
            common: CommonTelemetry {
                finish_reason,
                rank: 1,
                top_speed: 180.0,
                duration_ms: 300_000,
            },
            cost_to_state: 10_000,
            ..PursuitTelemetry::default()
        })
    }

    #[tokio::test]
    async fn submit_against_unknown_session_is_not_found() {
        let h = harness();
        assert!(matches!(
            h.arbiter.submit(404, 10, &drag(1, 1)).await,
            Err(EngineError::SessionNotFound(404))
        ));
    }

    #[tokio::test]
    async fn launch_requires_an_existing_session() {
        let h = harness();
        assert!(matches!(
            h.arbiter.launch(404, 10).await,
            Err(EngineError::SessionNotFound(404))
        ));
    }

    #[tokio::test]
    async fn meeting_place_submission_returns_empty_outcome_without_mutation() {
        let h = harness();
        seed_session(&h, 1, RaceMode::MeetingPlace, false, &[10]).await;

        let outcome = h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();
        assert!(outcome.entrants.is_empty());
        assert!(!h.store.get_race_record(1, 10).await.unwrap().is_final());
        assert_eq!(h.store.get_session(1).await.unwrap().ended_at, None);
    }

    #[tokio::test]
    async fn outcome_lists_every_entrant_including_the_submitter() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, false, &[10, 20, 30]).await;

        let outcome = h.arbiter.submit(1, 20, &drag(1, 1)).await.unwrap();
        let personas: Vec<PersonaId> = outcome.entrants.iter().map(|e| e.persona_id).collect();
        assert_eq!(personas, vec![10, 20, 30]);

        let own = outcome
            .entrants
            .iter()
            .find(|e| e.persona_id == 20)
            .unwrap();
        assert_eq!(own.finish_reason, 1);
        assert_eq!(own.rank, 1);
    }

    #[tokio::test]
    async fn replayed_submission_fails_and_leaves_record_unchanged() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, false, &[10, 20]).await;
        let mut rx_20 = h.notifier.register(20);

        h.arbiter.submit(1, 10, &drag(1, 2)).await.unwrap();
        let result = h.arbiter.submit(1, 10, &drag(1, 1)).await;
        assert!(matches!(result, Err(EngineError::AlreadyCompleted { .. })));

        let record = h.store.get_race_record(1, 10).await.unwrap();
        assert_eq!(record.rank, 2);

        // Exactly one fan-out happened.
        assert!(matches!(
            rx_20.try_recv().unwrap(),
            RaceEvent::RacerResult { persona_id: 10, .. }
        ));
        assert!(rx_20.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_telemetry_leaves_no_trace() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, true, &[10, 20]).await;
        let mut rx_20 = h.notifier.register(20);

        let result = h
            .arbiter
            .submit(1, 10, &Telemetry::Route(RouteTelemetry::default()))
            .await;
        assert!(matches!(result, Err(EngineError::MalformedRequest(_))));

        assert!(!h.store.get_race_record(1, 10).await.unwrap().is_final());
        assert_eq!(h.store.get_session(1).await.unwrap().ended_at, None);
        assert!(rx_20.try_recv().is_err());
        assert!(!h.dnf.is_pending(1, 20));
    }

    #[tokio::test]
    async fn winner_arms_countdowns_for_unfinished_players_only() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, true, &[10, 20, 30]).await;

        // 30 finishes second before the winner submits.
        h.arbiter.submit(1, 30, &drag(1, 2)).await.unwrap();
        let mut rx_20 = h.notifier.register(20);
        let mut rx_30 = h.notifier.register(30);

        h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();

        assert!(h.dnf.is_pending(1, 20));
        assert!(!h.dnf.is_pending(1, 30));
        assert!(!h.dnf.is_pending(1, 10));

        // 20 got the result plus the countdown warning; 30 only the result.
        assert!(matches!(
            rx_20.try_recv().unwrap(),
            RaceEvent::RacerResult { .. }
        ));
        assert!(matches!(
            rx_20.try_recv().unwrap(),
            RaceEvent::DnfCountdownStarted { .. }
        ));
        assert!(matches!(
            rx_30.try_recv().unwrap(),
            RaceEvent::RacerResult { .. }
        ));
        assert!(rx_30.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_winning_submission_arms_nothing() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, true, &[10, 20]).await;

        h.arbiter.submit(1, 10, &drag(1, 2)).await.unwrap();
        assert!(!h.dnf.is_pending(1, 20));
    }

    #[tokio::test]
    async fn dnf_disabled_session_never_arms() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, false, &[10, 20]).await;

        h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();
        assert!(!h.dnf.is_pending(1, 20));
    }

    #[tokio::test]
    async fn own_submission_cancels_the_pending_countdown() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, true, &[10, 20]).await;

        h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();
        assert!(h.dnf.is_pending(1, 20));

        h.arbiter.submit(1, 20, &drag(1, 2)).await.unwrap();
        assert!(!h.dnf.is_pending(1, 20));

        // The countdown's eventual elapse (token 1) must lose its claim.
        let outcome = h.arbiter.finalize_dnf(1, 20, 1).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(
            h.store.get_race_record(1, 20).await.unwrap().finish_reason,
            1
        );
    }

    #[tokio::test]
    async fn elapsed_countdown_stamps_the_dnf_code_and_notifies() {
        let h = harness();
        seed_session(&h, 1, RaceMode::Drag, true, &[10, 20]).await;

        h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();
        let mut rx_10 = h.notifier.register(10);
        assert!(h.dnf.is_pending(1, 20));
        let token = 1;

        let outcome = h.arbiter.finalize_dnf(1, 20, token).await.unwrap().unwrap();
        assert_eq!(outcome.persona_id, 20);
        assert_eq!(outcome.entrants.len(), 2);
        assert_eq!(outcome.rewards.cash, 0);

        let record = h.store.get_race_record(1, 20).await.unwrap();
        assert_eq!(record.finish_reason, FINISH_DNF);

        // The winner hears about the straggler's forced result.
        assert!(matches!(
            rx_10.try_recv().unwrap(),
            RaceEvent::RacerResult {
                persona_id: 20,
                finish_reason: FINISH_DNF,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bust_requires_pursuit_telemetry() {
        let h = harness();
        seed_session(&h, 1, RaceMode::PursuitSingle, false, &[10]).await;

        assert!(matches!(
            h.arbiter.bust(1, 10, &drag(1, 1)).await,
            Err(EngineError::MalformedRequest(_))
        ));
        assert!(!h.store.get_race_record(1, 10).await.unwrap().is_final());

        let outcome = h.arbiter.bust(1, 10, &pursuit(3)).await.unwrap();
        assert_eq!(outcome.persona_id, 10);
        assert_eq!(
            h.store.get_race_record(1, 10).await.unwrap().finish_reason,
            3
        );
    }

    #[tokio::test]
    async fn unauthorized_submission_mutates_nothing() {
        struct DenyAll;
        impl OwnershipVerifier for DenyAll {
            fn verify(
                &self,
                persona_id: PersonaId,
                session_id: SessionId,
            ) -> Result<(), EngineError> {
                Err(EngineError::Unauthorized {
                    session_id,
                    persona_id,
                })
            }
        }

        let store = Arc::new(InMemorySessionStore::new());
        store
            .create_session(Session::new(1, 900, RaceMode::Drag, true))
            .await
            .unwrap();
        store.open_race_record(1, 10).await.unwrap();
        let (dnf, _dnf_rx) = DnfScheduler::new(Duration::from_secs(60));
        let arbiter = Arbiter::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::new(ChannelNotifier::new()),
            ScoringTriggers::default(),
            Arc::new(MatchmakingQueue::new()),
            Arc::new(dnf),
            Box::new(DenyAll),
        );

        assert!(matches!(
            arbiter.submit(1, 10, &drag(1, 1)).await,
            Err(EngineError::Unauthorized { .. })
        ));
        assert!(!store.get_race_record(1, 10).await.unwrap().is_final());
    }

    #[tokio::test]
    async fn scoring_failure_does_not_fail_the_submission() {
        struct BrokenRewards;
        impl RewardCalculator for BrokenRewards {
            fn compute_rewards(
                &self,
                _ctx: &ScoreContext,
            ) -> Result<RewardSummary, ScoringError> {
                Err(ScoringError::Unavailable("table service down".into()))
            }
        }

        let scoring = ScoringTriggers {
            rewards: Box::new(BrokenRewards),
            ..ScoringTriggers::default()
        };
        let h = harness_with(scoring);
        seed_session(&h, 1, RaceMode::Drag, false, &[10]).await;

        let outcome = h.arbiter.submit(1, 10, &drag(1, 1)).await.unwrap();
        assert_eq!(outcome.rewards.cash, 0);
        assert!(h.store.get_race_record(1, 10).await.unwrap().is_final());
    }

    #[tokio::test]
    async fn launch_pulls_the_player_out_of_matchmaking() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .create_session(Session::new(1, 900, RaceMode::Circuit, false))
            .await
            .unwrap();
        let matchmaking = Arc::new(MatchmakingQueue::new());
        matchmaking.enqueue(10);
        let (dnf, _dnf_rx) = DnfScheduler::new(Duration::from_secs(60));
        let arbiter = Arbiter::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::new(ChannelNotifier::new()),
            ScoringTriggers::default(),
            Arc::clone(&matchmaking),
            Arc::new(dnf),
            Box::new(AllowAll),
        );

        arbiter.launch(1, 10).await.unwrap();
        assert!(!matchmaking.contains(10));
        assert!(!store.get_race_record(1, 10).await.unwrap().is_final());
    }
}
