//! Best-effort delivery of real-time race events to specific players
//!
//! Delivery has no guarantee and no return value the engine inspects: a
//! submission must never fail or block because another participant is
//! unreachable. Failed sends are logged and dropped.

use log::{debug, warn};
use shared::{PersonaId, RaceEvent};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;

pub trait Notifier: Send + Sync {
    fn notify(&self, persona_id: PersonaId, event: RaceEvent);
}

/// In-process notifier backed by per-persona channels.
///
/// The standard backend when no relay is configured, and the seam the test
/// suites use to observe fan-out: register a persona, read its receiver.
pub struct ChannelNotifier {
    routes: RwLock<HashMap<PersonaId, mpsc::UnboundedSender<RaceEvent>>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        ChannelNotifier {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a persona as reachable and returns its event stream.
    /// Re-registering replaces the previous route.
    pub fn register(&self, persona_id: PersonaId) -> mpsc::UnboundedReceiver<RaceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.write().unwrap().insert(persona_id, tx);
        rx
    }

    pub fn unregister(&self, persona_id: PersonaId) {
        self.routes.write().unwrap().remove(&persona_id);
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, persona_id: PersonaId, event: RaceEvent) {
        let delivered = match self.routes.read().unwrap().get(&persona_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                debug!("persona {} not reachable, dropping event", persona_id);
                return;
            }
        };

        if !delivered {
            // Receiver dropped without unregistering; prune the dead route.
            warn!(
                "dropping event for persona {}: route closed",
                persona_id
            );
            self.routes.write().unwrap().remove(&persona_id);
        }
    }
}
