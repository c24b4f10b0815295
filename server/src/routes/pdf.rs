//! `GET /api/chat/{session_id}/report.pdf`: renders a completed session's
//! final report through `dr-pdf`.

use axum::extract::{Path, State};
use axum::response::Response;
use dr_session::SessionId;

use crate::error::ServerError;
use crate::state::AppState;

pub async fn export_report(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    let session = state
        .sessions
        .get_session(&SessionId(session_id.clone()))
        .await
        .map_err(ServerError::SessionCreation)?
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;

    let report = session
        .final_report
        .as_deref()
        .ok_or_else(|| ServerError::NoFinalReport(session_id.clone()))?;

    let title = format!("Research Report: {}", session.original_query);
    let pdf_bytes = dr_pdf::render_report(report, &title)?;

    Response::builder()
        .header("content-type", "application/pdf")
        .header(
            "content-disposition",
            format!("attachment; filename=\"report-{session_id}.pdf\""),
        )
        .body(axum::body::Body::from(pdf_bytes))
        .map_err(|error| ServerError::BadRequest(error.to_string()))
}
