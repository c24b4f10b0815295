//! REST endpoints: start/resume a chat turn, stream its progress over SSE,
//! and cancel an in-flight deep-research run (§4.11).

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use dr_session::{ChatMessage, ChatRole, Mode, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::AppState;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Identifies the conversation this turn belongs to.
    pub chat_id: String,
    /// The user's message.
    pub message: String,
    /// One of the §6 mode aliases; defaults to `chat` when absent.
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub mode: &'static str,
    pub stream_url: String,
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Chat => "chat",
        Mode::Web => "web",
        Mode::DeepSearch => "deep_search",
        Mode::DeepResearch => "deep_research",
    }
}

/// Starts (or resumes, e.g. after a clarification answer) a research
/// session for `chat_id` and kicks off its run in the background. The
/// caller follows up with `GET /api/chat/{session_id}/stream` to watch it.
pub async fn start_turn(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    if request.message.trim().is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".to_string()));
    }
    let mode = request.mode.as_deref().map(Mode::from_alias).unwrap_or(Mode::Chat);

    let (session, _is_new) = state
        .sessions
        .get_or_create_session(&request.chat_id, &request.message, mode)
        .await
        .map_err(ServerError::SessionCreation)?;

    state
        .chat_store
        .upsert_message(ChatMessage {
            chat_id: request.chat_id.clone(),
            message_id: format!("user_{}_{}", session.id.0, now_ms()),
            role: ChatRole::User,
            content: request.message.clone(),
            created_at: now_ms(),
        })
        .await
        .map_err(ServerError::SessionCreation)?;

    let session_id = session.id.0.clone();
    let run_state = state.clone();
    let run_session = session.clone();
    tokio::spawn(async move {
        crate::session_runner::run_turn(run_state, run_session, request.message).await;
    });

    Ok(Json(ChatResponse {
        session_id: session_id.clone(),
        mode: mode_label(session.mode),
        stream_url: format!("/api/chat/{session_id}/stream"),
    }))
}

/// Streams `session_id`'s events as Server-Sent Events, replaying any
/// history already emitted before this subscriber connected.
pub async fn stream_turn(Path(session_id): Path<String>, State(state): State<AppState>) -> Response {
    let bus = state.streaming.bus_for(&session_id).await;
    let (history, mut receiver) = bus.subscribe_with_replay().await;

    let stream = async_stream::stream! {
        for event in history {
            yield Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(event.to_sse_frame()));
        }
        loop {
            match receiver.recv().await {
                Ok(event) => yield Ok(axum::body::Bytes::from(event.to_sse_frame())),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Response::builder()
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .body(axum::body::Body::from_stream(stream))
        .unwrap_or_else(|_| Response::new(axum::body::Body::empty()))
}

/// Cancels an in-flight deep-research run. A no-op (but not an error) for
/// sessions that have already finished, or whose mode has no node
/// boundary to cancel at.
pub async fn cancel_turn(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let session = state
        .sessions
        .get_session(&SessionId(session_id.clone()))
        .await
        .map_err(ServerError::SessionCreation)?
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;

    if let Some(token) = state.cancel_tokens.lock().await.get(&session_id) {
        token.cancel();
    }
    if session.status.is_active_ish() {
        state
            .sessions
            .update_status(&session.id, SessionStatus::Cancelled)
            .await
            .map_err(ServerError::SessionCreation)?;
    }

    Ok(Json(serde_json::json!({ "cancelled": true })))
}
