//! Matchmaking queue membership
//!
//! Placement logic lives elsewhere; the engine only needs to pull a player
//! out of the queue when their race launches.

use log::debug;
use shared::PersonaId;
use std::sync::Mutex;

pub struct MatchmakingQueue {
    queued: Mutex<Vec<PersonaId>>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        MatchmakingQueue {
            queued: Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, persona_id: PersonaId) {
        let mut queued = self.queued.lock().unwrap();
        if !queued.contains(&persona_id) {
            queued.push(persona_id);
        }
    }

    /// Removes the player from the queue; a player who was never queued is
    /// a no-op. Returns whether the player was queued.
    pub fn remove_from_queue(&self, persona_id: PersonaId) -> bool {
        let mut queued = self.queued.lock().unwrap();
        let before = queued.len();
        queued.retain(|id| *id != persona_id);
        let removed = queued.len() != before;
        if removed {
            debug!("removed persona {} from matchmaking queue", persona_id);
        }
        removed
    }

    pub fn contains(&self, persona_id: PersonaId) -> bool {
        self.queued.lock().unwrap().contains(&persona_id)
    }

    pub fn len(&self) -> usize {
        self.queued.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.lock().unwrap().is_empty()
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new()
    }
}
