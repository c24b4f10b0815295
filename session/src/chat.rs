//! Chat message history (§3 supplement), persisted independently of the
//! research session so plain-chat turns don't need one.

use serde::{Deserialize, Serialize};

/// Who authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The end user.
    User,
    /// The assistant (final report, clarification question, chat reply...).
    Assistant,
}

/// One message in a chat's history.
///
/// `message_id` is caller-assigned and is the idempotency key for
/// `upsert_message`: replaying a `done` streaming event with the same id
/// overwrites rather than duplicates (§6 P6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The chat this message belongs to.
    pub chat_id: String,
    /// Caller-assigned idempotency key.
    pub message_id: String,
    /// Who wrote it.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
    /// Epoch milliseconds, used for ordering alongside `message_id`.
    pub created_at: u64,
}
