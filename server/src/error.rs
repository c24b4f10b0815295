//! The server's public error type. Internal plumbing still threads
//! `anyhow::Result` the way `dr-agent`'s does; this is only the boundary
//! type handlers convert into an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced at the HTTP/WebSocket boundary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request body failed validation before any session work began.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No session exists with the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session exists but has no final report to export yet.
    #[error("session {0} has no final report yet")]
    NoFinalReport(String),

    /// §7 "Fatal": failing to create the session row itself. Returned as
    /// an error response without ever opening a stream.
    #[error("failed to create session: {0}")]
    SessionCreation(#[source] dr_session::SessionError),

    /// Rendering the PDF export failed.
    #[error("pdf export failed: {0}")]
    Pdf(#[from] dr_pdf::PdfError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) | Self::NoFinalReport(_) => StatusCode::NOT_FOUND,
            Self::SessionCreation(_) | Self::Pdf(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
