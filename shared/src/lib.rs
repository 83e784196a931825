use serde::{Deserialize, Serialize};

pub type SessionId = u64;
pub type PersonaId = u64;

/// A race record with this finish reason has not produced a final result yet.
pub const FINISH_NONE: u32 = 0;
/// Terminal code stamped by the server when the DNF countdown elapses.
/// Reserved: client telemetry must never carry it.
pub const FINISH_DNF: u32 = 2;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaceMode {
    Drag,
    Circuit,
    Sprint,
    PursuitSingle,
    PursuitTeam,
    MeetingPlace,
}

// Fields every mode reports at the finish line.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CommonTelemetry {
    pub finish_reason: u32,
    pub rank: u32,
    pub top_speed: f32,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DragTelemetry {
    pub common: CommonTelemetry,
    pub fraction_completed: f32,
    pub collision_count: u32,
    pub longest_jump_ms: u64,
    pub sum_of_jumps_ms: u64,
    pub perfect_start: bool,
}

// Shared by Circuit and Sprint.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RouteTelemetry {
    pub common: CommonTelemetry,
    pub best_lap_ms: u64,
    pub lap_count: u32,
    pub fraction_completed: f32,
    pub collision_count: u32,
    pub perfect_start: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PursuitTelemetry {
    pub common: CommonTelemetry,
    pub cost_to_state: u32,
    pub infraction_count: u32,
    pub cops_disabled: u32,
    pub cops_rammed: u32,
    pub roadblocks_dodged: u32,
    pub spike_strips_dodged: u32,
    pub longest_jump_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TeamEscapeTelemetry {
    pub common: CommonTelemetry,
    pub fraction_completed: f32,
    pub busted_count: u32,
    pub cops_disabled: u32,
    pub roadblocks_dodged: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Telemetry {
    Drag(DragTelemetry),
    Route(RouteTelemetry),
    Pursuit(PursuitTelemetry),
    TeamEscape(TeamEscapeTelemetry),
}

impl Telemetry {
    pub fn common(&self) -> &CommonTelemetry {
        match self {
            Telemetry::Drag(t) => &t.common,
            Telemetry::Route(t) => &t.common,
            Telemetry::Pursuit(t) => &t.common,
            Telemetry::TeamEscape(t) => &t.common,
        }
    }
}

/// One entrant's line in an aggregated race outcome.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntrantSummary {
    pub persona_id: PersonaId,
    pub finish_reason: u32,
    pub rank: u32,
    pub top_speed: f32,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RewardSummary {
    pub cash: u32,
    pub reputation: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DamageSummary {
    pub durability_delta: f32,
}

/// Aggregated, client-facing result of one arbitration submission.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Outcome {
    pub event_id: u32,
    pub session_id: SessionId,
    pub persona_id: PersonaId,
    pub entrants: Vec<EntrantSummary>,
    pub rewards: RewardSummary,
    pub damage: DamageSummary,
}

impl Outcome {
    // Returned for modes without an arbitration handler (meeting place).
    pub fn empty(event_id: u32, session_id: SessionId, persona_id: PersonaId) -> Self {
        Outcome {
            event_id,
            session_id,
            persona_id,
            entrants: Vec::new(),
            rewards: RewardSummary::default(),
            damage: DamageSummary::default(),
        }
    }
}

/// Real-time payloads fanned out to the other participants of a session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum RaceEvent {
    RacerResult {
        session_id: SessionId,
        persona_id: PersonaId,
        finish_reason: u32,
        rank: u32,
        top_speed: f32,
        duration_ms: u64,
    },
    DnfCountdownStarted {
        session_id: SessionId,
        countdown_ms: u64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyCompleted,
    MalformedRequest,
    Unauthorized,
    Internal,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Lobby surface
    OpenSession {
        session_id: SessionId,
        event_id: u32,
        mode: RaceMode,
        dnf_enabled: bool,
    },
    Launch {
        session_id: SessionId,
        persona_id: PersonaId,
    },
    Submit {
        session_id: SessionId,
        persona_id: PersonaId,
        telemetry: Telemetry,
    },
    Bust {
        session_id: SessionId,
        persona_id: PersonaId,
        telemetry: Telemetry,
    },
    Abort {
        session_id: SessionId,
    },

    // Replies
    Ack,
    RaceOutcome {
        outcome: Outcome,
    },
    Kicked {
        reason: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}
