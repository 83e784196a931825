//! Session and race-record persistence contracts
//!
//! The arbitration engine only ever touches storage through the
//! [`SessionStore`] trait: session lookup/update, per-player race record
//! lookup/update, and the ordered aggregate read used to assemble outcomes.
//! [`InMemorySessionStore`] is the standard backend; a database-backed
//! implementation can be dropped in without touching the engine.

use crate::error::EngineError;
use crate::utils::get_timestamp;
use async_trait::async_trait;
use shared::{PersonaId, RaceMode, SessionId, FINISH_NONE};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One shared race instance with a fixed mode and participant set.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Identifier of the race definition this session was created from.
    pub event_id: u32,
    pub mode: RaceMode,
    pub dnf_enabled: bool,
    /// Unset until the first authoritative finish is recorded.
    /// Concurrent updates are last-write-wins: the field only marks that
    /// some player has finished, not a ranking.
    pub ended_at: Option<u64>,
}

impl Session {
    pub fn new(id: SessionId, event_id: u32, mode: RaceMode, dnf_enabled: bool) -> Self {
        Session {
            id,
            event_id,
            mode,
            dnf_enabled,
            ended_at: None,
        }
    }
}

/// Per-player, per-session telemetry row.
///
/// The finish reason transitions from [`FINISH_NONE`] to a nonzero terminal
/// code exactly once; a row holding a nonzero finish reason is immutable
/// with respect to further arbitration submissions.
#[derive(Debug, Clone)]
pub struct RaceRecord {
    pub session_id: SessionId,
    pub persona_id: PersonaId,
    pub finish_reason: u32,
    pub rank: u32,
    pub top_speed: f32,
    pub duration_ms: u64,

    // Mode-specific columns; zeroed for modes that do not report them.
    pub fraction_completed: f32,
    pub collision_count: u32,
    pub longest_jump_ms: u64,
    pub sum_of_jumps_ms: u64,
    pub perfect_start: bool,
    pub best_lap_ms: u64,
    pub lap_count: u32,
    pub cost_to_state: u32,
    pub infraction_count: u32,
    pub cops_disabled: u32,
    pub cops_rammed: u32,
    pub roadblocks_dodged: u32,
    pub spike_strips_dodged: u32,
    pub busted_count: u32,

    pub updated_at: u64,
}

impl RaceRecord {
    /// Opens a zeroed tracking row for a player entering the session.
    pub fn open(session_id: SessionId, persona_id: PersonaId) -> Self {
        RaceRecord {
            session_id,
            persona_id,
            finish_reason: FINISH_NONE,
            rank: 0,
            top_speed: 0.0,
            duration_ms: 0,
            fraction_completed: 0.0,
            collision_count: 0,
            longest_jump_ms: 0,
            sum_of_jumps_ms: 0,
            perfect_start: false,
            best_lap_ms: 0,
            lap_count: 0,
            cost_to_state: 0,
            infraction_count: 0,
            cops_disabled: 0,
            cops_rammed: 0,
            roadblocks_dodged: 0,
            spike_strips_dodged: 0,
            busted_count: 0,
            updated_at: get_timestamp(),
        }
    }

    /// A record with a nonzero finish reason holds an authoritative result.
    pub fn is_final(&self) -> bool {
        self.finish_reason != FINISH_NONE
    }
}

/// Narrow storage contract consumed by the arbitration engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), EngineError>;

    async fn get_session(&self, id: SessionId) -> Result<Session, EngineError>;

    async fn update_session(&self, session: &Session) -> Result<(), EngineError>;

    /// Opens a zeroed race record for (session, player). Idempotent: an
    /// existing row is left untouched.
    async fn open_race_record(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<(), EngineError>;

    async fn get_race_record(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<RaceRecord, EngineError>;

    async fn update_race_record(&self, record: &RaceRecord) -> Result<(), EngineError>;

    /// All race records of a session, in the order the players entered it.
    async fn list_race_records(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<RaceRecord>, EngineError>;
}

struct SessionSlot {
    session: Session,
    // Insertion order is the order returned to aggregate reads.
    records: Vec<RaceRecord>,
}

/// In-memory store backing the standalone server and the test suites.
///
/// All reads return snapshots, so callers never observe a row mid-update.
/// The engine serializes read-modify-write cycles per (session, player)
/// itself; the store only guarantees that individual operations are atomic.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        InMemorySessionStore {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(EngineError::Store(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(
            session.id,
            SessionSlot {
                session,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, EngineError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|slot| slot.session.clone())
            .ok_or(EngineError::SessionNotFound(id))
    }

    async fn update_session(&self, session: &Session) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(&session.id)
            .ok_or(EngineError::SessionNotFound(session.id))?;
        slot.session = session.clone();
        Ok(())
    }

    async fn open_race_record(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        if slot.records.iter().any(|r| r.persona_id == persona_id) {
            return Ok(());
        }
        slot.records.push(RaceRecord::open(session_id, persona_id));
        Ok(())
    }

    async fn get_race_record(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<RaceRecord, EngineError> {
        let sessions = self.sessions.read().await;
        let slot = sessions
            .get(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        slot.records
            .iter()
            .find(|r| r.persona_id == persona_id)
            .cloned()
            .ok_or(EngineError::RecordNotFound {
                session_id,
                persona_id,
            })
    }

    async fn update_race_record(&self, record: &RaceRecord) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(&record.session_id)
            .ok_or(EngineError::SessionNotFound(record.session_id))?;
        let row = slot
            .records
            .iter_mut()
            .find(|r| r.persona_id == record.persona_id)
            .ok_or(EngineError::RecordNotFound {
                session_id: record.session_id,
                persona_id: record.persona_id,
            })?;
        *row = record.clone();
        Ok(())
    }

    async fn list_race_records(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<RaceRecord>, EngineError> {
        let sessions = self.sessions.read().await;
        let slot = sessions
            .get(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        Ok(slot.records.clone())
    }
}
