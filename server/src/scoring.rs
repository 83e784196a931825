//! Scoring trigger contracts: rewards, vehicle damage, achievements
//!
//! These are computation collaborators invoked by the dispatcher after a
//! result is merged. Their failures are reported distinctly but never fail
//! the arbitration itself — the race outcome stands even if a reward drops.
//! The actual value tables are deliberately simple here; tuning them is out
//! of scope.

use crate::store::{RaceRecord, Session};
use shared::{DamageSummary, PersonaId, RaceMode, RewardSummary, SessionId, Telemetry};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("no value table for mode {0:?}")]
    MissingTable(RaceMode),
    #[error("scoring state unavailable: {0}")]
    Unavailable(String),
}

/// What kind of terminal result is being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    Finished,
    Dnf,
    Busted,
}

/// Context handed to reward and damage calculators.
///
/// Telemetry is absent for server-synthesized results (DNF), where only the
/// stored record exists.
pub struct ScoreContext<'a> {
    pub persona_id: PersonaId,
    pub session: &'a Session,
    pub record: &'a RaceRecord,
    pub telemetry: Option<&'a Telemetry>,
    pub event: ScoreEvent,
}

/// Named-field context for achievement progress updates.
#[derive(Debug, Clone)]
pub struct AchievementEventContext {
    pub session_id: SessionId,
    pub mode: RaceMode,
    pub event: ScoreEvent,
    pub rank: u32,
    pub finish_reason: u32,
    pub duration_ms: u64,
}

pub trait RewardCalculator: Send + Sync {
    fn compute_rewards(&self, ctx: &ScoreContext) -> Result<RewardSummary, ScoringError>;
}

pub trait DamageCalculator: Send + Sync {
    fn compute_damage(&self, ctx: &ScoreContext) -> Result<DamageSummary, ScoringError>;
}

pub trait AchievementTracker: Send + Sync {
    fn update_achievements(
        &self,
        persona_id: PersonaId,
        ctx: &AchievementEventContext,
    ) -> Result<(), ScoringError>;
}

/// Bundle of the three triggers the dispatcher invokes per submission.
pub struct ScoringTriggers {
    pub rewards: Box<dyn RewardCalculator>,
    pub damage: Box<dyn DamageCalculator>,
    pub achievements: Box<dyn AchievementTracker>,
}

impl Default for ScoringTriggers {
    fn default() -> Self {
        ScoringTriggers {
            rewards: Box::new(StandardRewards::default()),
            damage: Box::new(WearDamage::default()),
            achievements: Box::new(AchievementLedger::new()),
        }
    }
}

/// Flat base payout with a winner multiplier and small mode extras.
pub struct StandardRewards {
    pub base_cash: u32,
    pub base_reputation: u32,
    pub perfect_start_bonus: u32,
}

impl Default for StandardRewards {
    fn default() -> Self {
        StandardRewards {
            base_cash: 500,
            base_reputation: 120,
            perfect_start_bonus: 75,
        }
    }
}

impl RewardCalculator for StandardRewards {
    fn compute_rewards(&self, ctx: &ScoreContext) -> Result<RewardSummary, ScoringError> {
        // A player who timed out earns nothing.
        if ctx.event == ScoreEvent::Dnf {
            return Ok(RewardSummary::default());
        }

        let mut cash = self.base_cash;
        let mut reputation = self.base_reputation;
        if ctx.record.rank == 1 {
            cash *= 2;
            reputation *= 2;
        }
        if ctx.record.perfect_start {
            cash += self.perfect_start_bonus;
        }
        // Pursuit payouts scale with the trouble caused.
        if matches!(
            ctx.session.mode,
            RaceMode::PursuitSingle | RaceMode::PursuitTeam
        ) {
            cash += ctx.record.cost_to_state / 100;
        }
        Ok(RewardSummary { cash, reputation })
    }
}

/// Durability loss from collisions plus ordinary race wear.
pub struct WearDamage {
    pub per_collision: f32,
    pub per_minute: f32,
    pub bust_penalty: f32,
}

impl Default for WearDamage {
    fn default() -> Self {
        WearDamage {
            per_collision: 1.5,
            per_minute: 0.4,
            bust_penalty: 10.0,
        }
    }
}

impl DamageCalculator for WearDamage {
    fn compute_damage(&self, ctx: &ScoreContext) -> Result<DamageSummary, ScoringError> {
        let minutes = ctx.record.duration_ms as f32 / 60_000.0;
        let mut loss =
            ctx.record.collision_count as f32 * self.per_collision + minutes * self.per_minute;
        if ctx.event == ScoreEvent::Busted {
            loss += self.bust_penalty;
        }
        Ok(DamageSummary {
            durability_delta: -loss.min(100.0),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AchievementProgress {
    pub races_finished: u32,
    pub wins: u32,
    pub dnfs: u32,
    pub busts: u32,
}

/// In-memory achievement progress ledger.
pub struct AchievementLedger {
    progress: Mutex<HashMap<PersonaId, AchievementProgress>>,
}

impl AchievementLedger {
    pub fn new() -> Self {
        AchievementLedger {
            progress: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self, persona_id: PersonaId) -> Option<AchievementProgress> {
        self.progress.lock().unwrap().get(&persona_id).copied()
    }
}

impl Default for AchievementLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AchievementTracker for AchievementLedger {
    fn update_achievements(
        &self,
        persona_id: PersonaId,
        ctx: &AchievementEventContext,
    ) -> Result<(), ScoringError> {
        let mut progress = self.progress.lock().unwrap();
        let entry = progress.entry(persona_id).or_default();
        match ctx.event {
            ScoreEvent::Finished => {
                entry.races_finished += 1;
                if ctx.rank == 1 {
                    entry.wins += 1;
                }
            }
            ScoreEvent::Dnf => entry.dnfs += 1,
            ScoreEvent::Busted => {
                entry.races_finished += 1;
                entry.busts += 1;
            }
        }
        Ok(())
    }
}
