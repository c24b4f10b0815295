//! Error type shared by the concrete OpenAI-compatible clients.

use thiserror::Error;

/// Transport/protocol errors from talking to an OpenAI-compatible endpoint.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// The HTTP request itself failed (connect, TLS, non-2xx status, decode).
    #[error("openai request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a response this client doesn't know how to parse.
    #[error("openai response malformed: {0}")]
    Malformed(String),
}
