//! Per-session event bus (§4.8): a broadcast channel plus a bounded
//! history ring so a reconnecting client can replay everything it missed.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};

use crate::event::StreamEvent;

const HISTORY_CAPACITY: usize = 1000;
const BROADCAST_CAPACITY: usize = 256;

struct Inner {
    history: Mutex<VecDeque<StreamEvent>>,
    sender: broadcast::Sender<StreamEvent>,
    finished: std::sync::atomic::AtomicBool,
}

/// One session's stream: every event ever sent, replayable, plus a live
/// feed for subscribers attached right now.
#[derive(Clone)]
pub struct SessionBus {
    inner: Arc<Inner>,
}

impl SessionBus {
    #[must_use]
    fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
                sender,
                finished: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Appends an event to history and broadcasts it to live subscribers.
    /// A no-op once `Done` has already been emitted.
    pub async fn emit(&self, event: StreamEvent) {
        if self.inner.finished.load(std::sync::atomic::Ordering::Relaxed) {
            return;
        }
        if event.event_type == crate::event::StreamEventType::Done {
            self.inner.finished.store(true, std::sync::atomic::Ordering::Relaxed);
        }

        let mut history = self.inner.history.lock().await;
        history.push_back(event.clone());
        if history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
        // No subscribers is not an error; the event is still retained in
        // history for whoever connects next.
        let _ = self.inner.sender.send(event);
    }

    /// Snapshots history and subscribes to new events atomically (under
    /// the same lock `emit` uses), so no event is skipped or duplicated
    /// across the replay/live boundary.
    pub async fn subscribe_with_replay(&self) -> (Vec<StreamEvent>, broadcast::Receiver<StreamEvent>) {
        let history = self.inner.history.lock().await;
        let receiver = self.inner.sender.subscribe();
        (history.iter().cloned().collect(), receiver)
    }

    /// True once this session's stream has emitted `Done`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Registry of live session buses, keyed by session id.
#[derive(Default)]
pub struct StreamingHub {
    sessions: RwLock<std::collections::HashMap<String, SessionBus>>,
}

impl StreamingHub {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the bus for `session_id`, creating it if this is the first
    /// event for that session.
    pub async fn bus_for(&self, session_id: &str) -> SessionBus {
        if let Some(bus) = self.sessions.read().await.get(session_id) {
            return bus.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionBus::new)
            .clone()
    }

    /// Drops a session's bus once its consumers are done with it (after
    /// the final message has been persisted downstream).
    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamEventType;
    use serde_json::json;

    fn event(event_type: StreamEventType) -> StreamEvent {
        StreamEvent {
            session_id: "s1".to_string(),
            event_type,
            timestamp_ms: 0,
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn late_subscriber_replays_full_history() {
        let bus = SessionBus::new();
        bus.emit(event(StreamEventType::Init)).await;
        bus.emit(event(StreamEventType::Status)).await;

        let (history, _receiver) = bus.subscribe_with_replay().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, StreamEventType::Init);
        assert_eq!(history[1].event_type, StreamEventType::Status);
    }

    #[tokio::test]
    async fn events_after_done_are_dropped() {
        let bus = SessionBus::new();
        bus.emit(event(StreamEventType::Done)).await;
        assert!(bus.is_finished());

        bus.emit(event(StreamEventType::Status)).await;
        let (history, _receiver) = bus.subscribe_with_replay().await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn history_ring_drops_oldest_past_capacity() {
        let bus = SessionBus::new();
        for _ in 0..(HISTORY_CAPACITY + 10) {
            bus.emit(event(StreamEventType::Status)).await;
        }
        let (history, _receiver) = bus.subscribe_with_replay().await;
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn hub_returns_the_same_bus_for_a_session() {
        let hub = StreamingHub::new();
        let a = hub.bus_for("s1").await;
        a.emit(event(StreamEventType::Init)).await;

        let b = hub.bus_for("s1").await;
        let (history, _receiver) = b.subscribe_with_replay().await;
        assert_eq!(history.len(), 1);
    }
}
