use thiserror::Error;

/// Errors surfaced by the streaming layer.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// No bus is registered for the requested session.
    #[error("no stream registered for session {0}")]
    UnknownSession(String),

    /// Persisting the final message to the chat store failed.
    #[error("chat store error: {0}")]
    ChatStore(#[from] dr_session::SessionError),
}
