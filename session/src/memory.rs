//! In-memory `SessionStore`/`ChatStore`, suitable for a single-process
//! deployment or for tests. A SQL-backed store can implement the same
//! traits without touching `SessionManager`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::chat::ChatMessage;
use crate::error::SessionError;
use crate::session::{Session, SessionId};
use crate::{ChatStore, SessionStore};

/// In-memory session and chat-history registry.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    chats: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn active_session(&self, chat_id: &str) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|s| s.chat_id == chat_id && s.status.is_active_ish())
            .cloned())
    }

    async fn insert(&self, session: Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }

    async fn supersede_active(&self, chat_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            if session.chat_id == chat_id && session.status.is_active_ish() {
                session.status = crate::session::SessionStatus::Superseded;
                session.updated_at = crate::session::now_ms();
            }
        }
        Ok(())
    }

    async fn update(&self, session: Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id.0).cloned())
    }

    async fn stale_active_sessions(
        &self,
        older_than: Duration,
    ) -> Result<Vec<Session>, SessionError> {
        let threshold = crate::session::now_ms().saturating_sub(older_than.as_millis() as u64);
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.status.is_active_ish() && s.updated_at < threshold)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ChatStore for InMemorySessionStore {
    async fn upsert_message(&self, message: ChatMessage) -> Result<(), SessionError> {
        let mut chats = self.chats.write().await;
        let history = chats.entry(message.chat_id.clone()).or_default();
        if let Some(existing) = history
            .iter_mut()
            .find(|m| m.message_id == message.message_id)
        {
            *existing = message;
        } else {
            history.push(message);
        }
        Ok(())
    }

    async fn messages_for_chat(&self, chat_id: &str) -> Result<Vec<ChatMessage>, SessionError> {
        let chats = self.chats.read().await;
        let mut messages = chats.get(chat_id).cloned().unwrap_or_default();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;
    use crate::session::{Mode, SessionStatus};
    use crate::SessionManager;

    #[tokio::test]
    async fn creating_a_session_supersedes_the_prior_active_one() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(store.clone());

        let first = manager
            .create_session("chat-1", "what is photosynthesis", Mode::DeepResearch)
            .await
            .unwrap();
        let second = manager
            .create_session("chat-1", "and what about cellular respiration", Mode::DeepResearch)
            .await
            .unwrap();

        let reloaded_first = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(reloaded_first.status, SessionStatus::Superseded);

        let active = manager.get_active_session("chat-1").await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[tokio::test]
    async fn only_one_active_session_per_chat() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(store);

        manager
            .create_session("chat-2", "q1", Mode::Web)
            .await
            .unwrap();
        manager
            .create_session("chat-2", "q2", Mode::Web)
            .await
            .unwrap();

        let (_, is_new) = manager
            .get_or_create_session("chat-2", "q3", Mode::Web)
            .await
            .unwrap();
        assert!(!is_new);
    }

    #[tokio::test]
    async fn chat_history_upsert_is_idempotent_on_message_id() {
        let store = InMemorySessionStore::new();
        store
            .upsert_message(ChatMessage {
                chat_id: "chat-3".to_string(),
                message_id: "m1".to_string(),
                role: ChatRole::Assistant,
                content: "draft".to_string(),
                created_at: 1,
            })
            .await
            .unwrap();
        store
            .upsert_message(ChatMessage {
                chat_id: "chat-3".to_string(),
                message_id: "m1".to_string(),
                role: ChatRole::Assistant,
                content: "final".to_string(),
                created_at: 1,
            })
            .await
            .unwrap();

        let messages = store.messages_for_chat("chat-3").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "final");
    }

    #[tokio::test]
    async fn expired_sweep_transitions_stale_sessions() {
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(store.clone());
        let session = manager
            .create_session("chat-4", "q", Mode::DeepResearch)
            .await
            .unwrap();

        {
            let mut sessions = store.sessions.write().await;
            sessions.get_mut(&session.id.0).unwrap().updated_at = 0;
        }

        let count = manager
            .cleanup_expired_sessions(Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let reloaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Expired);
    }
}
