//! The `Session` record (§3) and its status/mode sum types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Research mode. See §6 for the accepted aliases each variant maps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Plain chat; no research session is created.
    Chat,
    /// Single-pass web search and synthesis.
    Web,
    /// Deep-search prelude plus clarification, without a full multi-agent run.
    DeepSearch,
    /// Full clarify → plan → execute → supervise → compress → report run.
    DeepResearch,
}

impl Mode {
    /// Resolves any of the accepted transport aliases (§6) to a canonical
    /// mode. Unrecognised input defaults to [`Mode::Chat`].
    #[must_use]
    pub fn from_alias(alias: &str) -> Self {
        match alias {
            "web" | "search" | "web_search" | "speed" => Self::Web,
            "deep_search" | "deep" | "balanced" => Self::DeepSearch,
            "deep_research" | "research" | "quality" => Self::DeepResearch,
            _ => Self::Chat,
        }
    }
}

/// Session lifecycle status (§3, Invariant I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Newly created, not yet progressed past the first node.
    Active,
    /// Suspended at the clarification turn, waiting on the user.
    WaitingClarification,
    /// Actively running the research graph.
    Researching,
    /// Finished; immutable except for `session_metadata` (Invariant I2).
    Completed,
    /// Replaced by a newer session for the same chat.
    Superseded,
    /// Cancelled by the user or an operator.
    Cancelled,
    /// Swept by `cleanup_expired_sessions`.
    Expired,
}

impl SessionStatus {
    /// True for statuses Invariant I1 counts as "at most one per chat".
    #[must_use]
    pub const fn is_active_ish(self) -> bool {
        matches!(
            self,
            Self::Active | Self::WaitingClarification | Self::Researching
        )
    }
}

/// A chat-scoped research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque generated id.
    pub id: SessionId,
    /// The chat this session belongs to.
    pub chat_id: String,
    /// The user's original, unmodified query.
    pub original_query: String,
    /// Research mode.
    pub mode: Mode,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation time, epoch milliseconds.
    pub created_at: u64,
    /// Last mutation time, epoch milliseconds.
    pub updated_at: u64,
    /// Completion time, epoch milliseconds, set once on `complete_session`.
    pub completed_at: Option<u64>,
    /// Output of the one-shot deep-search prelude (C9), if run.
    pub deep_search_result: Option<String>,
    /// The user's answers to the clarification turn, if any.
    pub clarification_answers: Option<String>,
    /// The supervisor's in-progress draft report.
    pub draft_report: Option<String>,
    /// The final report, set once on completion.
    pub final_report: Option<String>,
    /// Open map for caller-defined metadata; mutable even after completion.
    pub session_metadata: Value,
}

impl Session {
    /// Creates a freshly-initialised session in `Active` status.
    #[must_use]
    pub fn new(chat_id: impl Into<String>, query: impl Into<String>, mode: Mode) -> Self {
        let now = now_ms();
        Self {
            id: SessionId(generate_id()),
            chat_id: chat_id.into(),
            original_query: query.into(),
            mode,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deep_search_result: None,
            clarification_answers: None,
            draft_report: None,
            final_report: None,
            session_metadata: Value::Object(Map::new()),
        }
    }
}

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sess_{:x}_{count:x}", now_ms())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_aliases_resolve() {
        assert_eq!(Mode::from_alias("speed"), Mode::Web);
        assert_eq!(Mode::from_alias("balanced"), Mode::DeepSearch);
        assert_eq!(Mode::from_alias("quality"), Mode::DeepResearch);
        assert_eq!(Mode::from_alias("whatever"), Mode::Chat);
    }

    #[test]
    fn active_ish_statuses() {
        assert!(SessionStatus::Active.is_active_ish());
        assert!(SessionStatus::WaitingClarification.is_active_ish());
        assert!(SessionStatus::Researching.is_active_ish());
        assert!(!SessionStatus::Completed.is_active_ish());
        assert!(!SessionStatus::Superseded.is_active_ish());
    }

    #[test]
    fn new_session_is_active_with_no_report() {
        let session = Session::new("chat-1", "how do tides work", Mode::DeepResearch);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.final_report.is_none());
        assert_eq!(session.chat_id, "chat-1");
    }
}
