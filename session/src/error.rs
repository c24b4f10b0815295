use thiserror::Error;

use crate::session::SessionId;

/// Errors surfaced by the session manager and its store implementations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session exists with the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The underlying store failed.
    #[error("session store error: {0}")]
    Store(#[source] anyhow::Error),
}
