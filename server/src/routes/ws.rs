//! WebSocket transport (§4.11): a JSON command/event bridge over the same
//! `chat:send`/`chat:cancel` operations the REST routes expose, for
//! clients that want a single long-lived connection instead of a
//! POST-then-SSE pair. Grounded on the teacher pack's own WebSocket
//! bridge pattern (`sven-node`'s `http/ws.rs`): one `tokio::select!` loop
//! reading inbound JSON frames while forwarding a broadcast receiver's
//! events out.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use dr_session::{ChatMessage, ChatRole, Mode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::state::AppState;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Inbound commands a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    #[serde(rename = "chat:send")]
    ChatSend {
        chat_id: String,
        message: String,
        #[serde(default)]
        mode: Option<String>,
    },
    #[serde(rename = "chat:cancel")]
    ChatCancel { session_id: String },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut active_receiver: Option<tokio::sync::broadcast::Receiver<dr_streaming::StreamEvent>> = None;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(ClientCommand::ChatSend { chat_id, message, mode }) => {
                                match start_session(&state, &chat_id, &message, mode.as_deref()).await {
                                    Ok(session_id) => {
                                        let bus = state.streaming.bus_for(&session_id).await;
                                        let (history, receiver) = bus.subscribe_with_replay().await;
                                        for event in history {
                                            if send_event(&mut socket, &event).await.is_err() {
                                                return;
                                            }
                                        }
                                        active_receiver = Some(receiver);
                                    }
                                    Err(error) => {
                                        warn!("chat:send failed: {error}");
                                        let _ = socket.send(Message::Text(
                                            serde_json::json!({ "type": "error", "error": error.to_string() })
                                                .to_string()
                                                .into(),
                                        )).await;
                                    }
                                }
                            }
                            Ok(ClientCommand::ChatCancel { session_id }) => {
                                if let Some(token) = state.cancel_tokens.lock().await.get(&session_id) {
                                    token.cancel();
                                }
                            }
                            Err(error) => {
                                warn!("invalid websocket command: {error}");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!("websocket recv error: {error}");
                        break;
                    }
                }
            }
            event = recv_if_active(&mut active_receiver) => {
                match event {
                    Some(Ok(event)) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
                    Some(Err(tokio::sync::broadcast::error::RecvError::Closed)) | None => {
                        active_receiver = None;
                    }
                }
            }
        }
    }
}

/// Awaits the active receiver if one is set, otherwise never resolves so
/// the `tokio::select!` arm stays parked until a `chat:send` installs one.
async fn recv_if_active(
    receiver: &mut Option<tokio::sync::broadcast::Receiver<dr_streaming::StreamEvent>>,
) -> Option<Result<dr_streaming::StreamEvent, tokio::sync::broadcast::error::RecvError>> {
    match receiver {
        Some(receiver) => Some(receiver.recv().await),
        None => std::future::pending().await,
    }
}

async fn send_event(socket: &mut WebSocket, event: &dr_streaming::StreamEvent) -> Result<(), axum::Error> {
    let body = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(body.into())).await
}

async fn start_session(
    state: &AppState,
    chat_id: &str,
    message: &str,
    mode: Option<&str>,
) -> anyhow::Result<String> {
    if message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }
    let mode = mode.map(Mode::from_alias).unwrap_or(Mode::Chat);

    let (session, _) = state.sessions.get_or_create_session(chat_id, message, mode).await?;
    state
        .chat_store
        .upsert_message(ChatMessage {
            chat_id: chat_id.to_string(),
            message_id: format!("user_{}_{}", session.id.0, now_ms()),
            role: ChatRole::User,
            content: message.to_string(),
            created_at: now_ms(),
        })
        .await?;

    let session_id = session.id.0.clone();
    let run_state = state.clone();
    let query = message.to_string();
    tokio::spawn(async move {
        crate::session_runner::run_turn(run_state, session, query).await;
    });

    Ok(session_id)
}
