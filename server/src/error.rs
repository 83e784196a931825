use shared::{ErrorKind, PersonaId, SessionId};
use thiserror::Error;

/// Failure taxonomy for arbitration operations.
///
/// Validation and state-invariant failures abort a submission before any
/// mutation, notification, or DNF arming has happened. `AlreadyCompleted`
/// is the one security-relevant variant: the transport layer is expected to
/// terminate the offending connection instead of returning a normal error
/// payload.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("no race record for persona {persona_id} in session {session_id}")]
    RecordNotFound {
        session_id: SessionId,
        persona_id: PersonaId,
    },

    #[error("persona {persona_id} already holds a final result in session {session_id}")]
    AlreadyCompleted {
        session_id: SessionId,
        persona_id: PersonaId,
    },

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("persona {persona_id} is not authorized for session {session_id}")]
    Unauthorized {
        session_id: SessionId,
        persona_id: PersonaId,
    },

    #[error("storage failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether the transport should drop the caller's connection rather
    /// than reply with an error payload.
    pub fn should_disconnect(&self) -> bool {
        matches!(self, EngineError::AlreadyCompleted { .. })
    }

    /// Wire-level classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::SessionNotFound(_) | EngineError::RecordNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::AlreadyCompleted { .. } => ErrorKind::AlreadyCompleted,
            EngineError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            EngineError::Unauthorized { .. } => ErrorKind::Unauthorized,
            EngineError::Store(_) => ErrorKind::Internal,
        }
    }
}
