//! HTTP/WebSocket route table.

mod chat;
mod pdf;
mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat::start_turn))
        .route("/api/chat/{session_id}/stream", get(chat::stream_turn))
        .route("/api/chat/{session_id}/cancel", post(chat::cancel_turn))
        .route("/api/chat/{session_id}/report.pdf", get(pdf::export_report))
        .route("/api/ws", get(ws::ws_handler))
}
