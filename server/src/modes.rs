//! Per-mode telemetry merge handlers
//!
//! A handler does exactly one thing: fold a telemetry packet into the
//! player's existing race record. Notification fan-out, scoring triggers,
//! and DNF scheduling are the dispatcher's job so that those invariants
//! apply uniformly to every mode.

use crate::error::EngineError;
use crate::store::{RaceRecord, Session};
use crate::utils::get_timestamp;
use shared::{CommonTelemetry, RaceMode, Telemetry, FINISH_DNF, FINISH_NONE};
use std::collections::HashMap;

pub trait ModeHandler: Send + Sync {
    fn merge(
        &self,
        session: &Session,
        record: &mut RaceRecord,
        telemetry: &Telemetry,
    ) -> Result<(), EngineError>;
}

// Guard shared by every handler before any field is touched.
fn check_open(record: &RaceRecord) -> Result<(), EngineError> {
    if record.is_final() {
        return Err(EngineError::AlreadyCompleted {
            session_id: record.session_id,
            persona_id: record.persona_id,
        });
    }
    Ok(())
}

fn apply_common(record: &mut RaceRecord, common: &CommonTelemetry) -> Result<(), EngineError> {
    if common.finish_reason == FINISH_NONE {
        return Err(EngineError::MalformedRequest(
            "telemetry must carry a terminal finish reason".into(),
        ));
    }
    if common.finish_reason == FINISH_DNF {
        return Err(EngineError::MalformedRequest(
            "DNF finish reason is reserved to the server".into(),
        ));
    }
    record.finish_reason = common.finish_reason;
    record.rank = common.rank;
    record.top_speed = common.top_speed;
    record.duration_ms = common.duration_ms;
    record.updated_at = get_timestamp();
    Ok(())
}

fn shape_mismatch(mode: RaceMode) -> EngineError {
    EngineError::MalformedRequest(format!("telemetry shape does not match mode {:?}", mode))
}

pub struct DragHandler;

impl ModeHandler for DragHandler {
    fn merge(
        &self,
        session: &Session,
        record: &mut RaceRecord,
        telemetry: &Telemetry,
    ) -> Result<(), EngineError> {
        check_open(record)?;
        let packet = match telemetry {
            Telemetry::Drag(p) => p,
            _ => return Err(shape_mismatch(session.mode)),
        };
        apply_common(record, &packet.common)?;
        record.fraction_completed = packet.fraction_completed;
        record.collision_count = packet.collision_count;
        record.longest_jump_ms = packet.longest_jump_ms;
        record.sum_of_jumps_ms = packet.sum_of_jumps_ms;
        record.perfect_start = packet.perfect_start;
        Ok(())
    }
}

// Circuit and Sprint share the checkpoint/lap telemetry shape.
pub struct RouteHandler;

impl ModeHandler for RouteHandler {
    fn merge(
        &self,
        session: &Session,
        record: &mut RaceRecord,
        telemetry: &Telemetry,
    ) -> Result<(), EngineError> {
        check_open(record)?;
        let packet = match telemetry {
            Telemetry::Route(p) => p,
            _ => return Err(shape_mismatch(session.mode)),
        };
        apply_common(record, &packet.common)?;
        record.best_lap_ms = packet.best_lap_ms;
        record.lap_count = packet.lap_count;
        record.fraction_completed = packet.fraction_completed;
        record.collision_count = packet.collision_count;
        record.perfect_start = packet.perfect_start;
        Ok(())
    }
}

pub struct PursuitHandler;

impl ModeHandler for PursuitHandler {
    fn merge(
        &self,
        session: &Session,
        record: &mut RaceRecord,
        telemetry: &Telemetry,
    ) -> Result<(), EngineError> {
        check_open(record)?;
        let packet = match telemetry {
            Telemetry::Pursuit(p) => p,
            _ => return Err(shape_mismatch(session.mode)),
        };
        apply_common(record, &packet.common)?;
        record.cost_to_state = packet.cost_to_state;
        record.infraction_count = packet.infraction_count;
        record.cops_disabled = packet.cops_disabled;
        record.cops_rammed = packet.cops_rammed;
        record.roadblocks_dodged = packet.roadblocks_dodged;
        record.spike_strips_dodged = packet.spike_strips_dodged;
        record.longest_jump_ms = packet.longest_jump_ms;
        Ok(())
    }
}

pub struct TeamEscapeHandler;

impl ModeHandler for TeamEscapeHandler {
    fn merge(
        &self,
        session: &Session,
        record: &mut RaceRecord,
        telemetry: &Telemetry,
    ) -> Result<(), EngineError> {
        check_open(record)?;
        let packet = match telemetry {
            Telemetry::TeamEscape(p) => p,
            _ => return Err(shape_mismatch(session.mode)),
        };
        apply_common(record, &packet.common)?;
        record.fraction_completed = packet.fraction_completed;
        record.busted_count = packet.busted_count;
        record.cops_disabled = packet.cops_disabled;
        record.roadblocks_dodged = packet.roadblocks_dodged;
        Ok(())
    }
}

/// Mode-to-handler routing table, built once at startup.
///
/// Meeting place has no entry: free-roam sessions produce no race result.
pub struct HandlerTable {
    handlers: HashMap<RaceMode, Box<dyn ModeHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        let mut handlers: HashMap<RaceMode, Box<dyn ModeHandler>> = HashMap::new();
        handlers.insert(RaceMode::Drag, Box::new(DragHandler));
        handlers.insert(RaceMode::Circuit, Box::new(RouteHandler));
        handlers.insert(RaceMode::Sprint, Box::new(RouteHandler));
        handlers.insert(RaceMode::PursuitSingle, Box::new(PursuitHandler));
        handlers.insert(RaceMode::PursuitTeam, Box::new(TeamEscapeHandler));
        HandlerTable { handlers }
    }

    pub fn get(&self, mode: RaceMode) -> Option<&dyn ModeHandler> {
        self.handlers.get(&mode).map(|h| h.as_ref())
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
