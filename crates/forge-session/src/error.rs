//! Session Store errors.

use forge_core::SessionId;
use thiserror::Error;

/// Errors the Session Store can surface to a caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session file (and every backup of it) failed to parse.
    #[error("session {0} is corrupt and no valid backup could be recovered: {1}")]
    Corrupt(SessionId, String),

    /// No session exists with the given id.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// Filesystem I/O failure while reading, writing, or locking a session.
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory session state could not be serialized for persistence.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionError> for forge_core::ForgeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Corrupt(id, reason) => Self::SessionCorrupt {
                session_id: id.to_string(),
                reason,
            },
            SessionError::NotFound(id) => Self::SessionCorrupt {
                session_id: id.to_string(),
                reason: "not found".to_string(),
            },
            SessionError::Io(e) => Self::Io(e),
            SessionError::Serialization(e) => Self::Serialization(e),
        }
    }
}

/// Result alias for this crate.
pub type SessionResult<T> = Result<T, SessionError>;
