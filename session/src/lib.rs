//! Chat-scoped session manager (C7).
//!
//! Enforces Invariant I1 (at most one session per chat in an active
//! status) and I2 (completed/superseded sessions are immutable save for
//! metadata). The relational store is an external dependency in the full
//! specification (§1); this crate defines the narrow DAO shape
//! (`SessionStore`) and ships an in-memory implementation suitable for a
//! single-process deployment or for tests, so a real SQL backend can
//! implement the same trait later without touching callers.

mod chat;
mod error;
mod memory;
mod session;

pub use chat::{ChatMessage, ChatRole};
pub use error::SessionError;
pub use memory::InMemorySessionStore;
pub use session::{Mode, Session, SessionId, SessionStatus};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Narrow DAO the session manager needs from a relational store.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session currently in an active status for this chat, if
    /// any (Invariant I1).
    async fn active_session(&self, chat_id: &str) -> Result<Option<Session>, SessionError>;

    /// Inserts a new session row.
    async fn insert(&self, session: Session) -> Result<(), SessionError>;

    /// Transitions every active-status session for this chat to
    /// `superseded`.
    async fn supersede_active(&self, chat_id: &str) -> Result<(), SessionError>;

    /// Replaces the stored session with `session` by id.
    async fn update(&self, session: Session) -> Result<(), SessionError>;

    /// Fetches a session by id.
    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, SessionError>;

    /// Returns every session whose status is active-ish and whose
    /// `updated_at` is older than `older_than`.
    async fn stale_active_sessions(
        &self,
        older_than: Duration,
    ) -> Result<Vec<Session>, SessionError>;
}

/// Operations over chat-scoped message history (§3 supplement).
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Appends a message, or updates it in place if `message_id` already
    /// exists (Invariant I6 / P6: idempotent `done` replay).
    async fn upsert_message(&self, message: ChatMessage) -> Result<(), SessionError>;

    /// Returns every message for a chat, ordered by `created_at` then
    /// `message_id`.
    async fn messages_for_chat(&self, chat_id: &str) -> Result<Vec<ChatMessage>, SessionError>;
}

/// High-level session manager: the operations named in §4.7.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    /// Builds a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Resumes the active session for `chat_id`, or creates one. Returns
    /// `(session, is_new)`.
    pub async fn get_or_create_session(
        &self,
        chat_id: &str,
        query: &str,
        mode: Mode,
    ) -> Result<(Session, bool), SessionError> {
        if let Some(session) = self.store.active_session(chat_id).await? {
            return Ok((session, false));
        }
        let session = self.create_session(chat_id, query, mode).await?;
        Ok((session, true))
    }

    /// Returns the active session for `chat_id`, if any.
    pub async fn get_active_session(&self, chat_id: &str) -> Result<Option<Session>, SessionError> {
        self.store.active_session(chat_id).await
    }

    /// Fetches a session directly by id, regardless of status.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, SessionError> {
        self.store.get(session_id).await
    }

    /// Creates a new session, atomically superseding any prior active one
    /// for the same chat first (Invariant I1, P3).
    pub async fn create_session(
        &self,
        chat_id: &str,
        query: &str,
        mode: Mode,
    ) -> Result<Session, SessionError> {
        self.store.supersede_active(chat_id).await?;
        let session = Session::new(chat_id, query, mode);
        self.store.insert(session.clone()).await?;
        Ok(session)
    }

    /// Transitions a session's status.
    pub async fn update_status(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> Result<(), SessionError> {
        self.mutate(session_id, |session| session.status = status)
            .await
    }

    /// Marks a session `completed` with its final report (Invariant I2
    /// takes effect once this returns).
    pub async fn complete_session(
        &self,
        session_id: &SessionId,
        final_report: impl Into<String>,
    ) -> Result<(), SessionError> {
        let report = final_report.into();
        self.mutate(session_id, |session| {
            session.final_report = Some(report.clone());
            session.status = SessionStatus::Completed;
            session.completed_at = Some(session::now_ms());
        })
        .await
    }

    /// Saves the one-shot deep-search prelude result.
    pub async fn save_deep_search_result(
        &self,
        session_id: &SessionId,
        result: impl Into<String>,
    ) -> Result<(), SessionError> {
        let result = result.into();
        self.mutate(session_id, |session| session.deep_search_result = Some(result.clone()))
            .await
    }

    /// Records the user's answers to a clarification turn.
    pub async fn save_clarification_answers(
        &self,
        session_id: &SessionId,
        answers: impl Into<String>,
    ) -> Result<(), SessionError> {
        let answers = answers.into();
        self.mutate(session_id, |session| {
            session.clarification_answers = Some(answers.clone());
        })
        .await
    }

    /// Saves the supervisor's in-progress draft report.
    pub async fn save_draft_report(
        &self,
        session_id: &SessionId,
        draft: impl Into<String>,
    ) -> Result<(), SessionError> {
        let draft = draft.into();
        self.mutate(session_id, |session| session.draft_report = Some(draft.clone()))
            .await
    }

    /// Merges keys into `session_metadata`. Permitted even on
    /// `completed`/`superseded` sessions (Invariant I2's sole exception).
    pub async fn merge_metadata(
        &self,
        session_id: &SessionId,
        patch: Value,
    ) -> Result<(), SessionError> {
        self.mutate(session_id, |session| {
            if let (Value::Object(existing), Value::Object(new)) =
                (&mut session.session_metadata, &patch)
            {
                for (key, value) in new {
                    existing.insert(key.clone(), value.clone());
                }
            }
        })
        .await
    }

    /// Explicitly supersedes every active session for a chat (e.g. the
    /// user switched research mode mid-chat).
    pub async fn supersede_active_sessions(&self, chat_id: &str) -> Result<(), SessionError> {
        self.store.supersede_active(chat_id).await
    }

    /// Periodic sweep: transitions active-ish sessions untouched for
    /// longer than `older_than` to `expired`.
    pub async fn cleanup_expired_sessions(&self, older_than: Duration) -> Result<usize, SessionError> {
        let stale = self.store.stale_active_sessions(older_than).await?;
        let count = stale.len();
        for mut session in stale {
            session.status = SessionStatus::Expired;
            self.store.update(session).await?;
        }
        Ok(count)
    }

    async fn mutate(
        &self,
        session_id: &SessionId,
        patch: impl FnOnce(&mut Session),
    ) -> Result<(), SessionError> {
        let mut session = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        patch(&mut session);
        session.updated_at = session::now_ms();
        self.store.update(session).await
    }
}
