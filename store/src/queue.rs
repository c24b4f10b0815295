//! Supervisor review queue (C5): an asynchronous FIFO of agent-completion
//! events, batch-drainable under a lock.
//!
//! Grounded on the original `SupervisorQueue` (see
//! `examples/original_source/backend/src/workflow/research/queue.py`):
//! `enqueue` appends under a lock, `process_batch` atomically pops up to
//! `max_batch_size` events and hands them to a caller-supplied closure, and
//! `wait_for_batch` advisory-coalesces near-simultaneous completions.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// One agent-completion event queued for supervisor review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorEvent {
    /// The agent that produced this event.
    pub agent_id: String,
    /// What happened (`"task_completed"`, `"no_tasks"`, ...).
    pub action: String,
    /// The result payload (typically a serialized `Finding`).
    pub result: Value,
    /// Unix epoch milliseconds when the event was enqueued.
    pub timestamp_ms: u64,
}

/// FIFO queue of [`SupervisorEvent`]s, guarded by a single internal lock.
#[derive(Debug, Default)]
pub struct SupervisorQueue {
    inner: Mutex<VecDeque<SupervisorEvent>>,
}

impl SupervisorQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Enqueue order is preserved by `process_batch`, but
    /// is not guaranteed to match wall-clock completion order across
    /// concurrently-running agents.
    pub async fn enqueue(&self, event: SupervisorEvent) {
        let mut queue = self.inner.lock().await;
        queue.push_back(event);
    }

    /// Extracts up to `max_batch_size` events atomically and invokes
    /// `handler` with them. Returns `None` without calling `handler` if the
    /// queue was empty.
    pub async fn process_batch<F, Fut, T>(
        &self,
        max_batch_size: usize,
        handler: F,
    ) -> Option<T>
    where
        F: FnOnce(Vec<SupervisorEvent>) -> Fut,
        Fut: Future<Output = T>,
    {
        let batch = {
            let mut queue = self.inner.lock().await;
            if queue.is_empty() {
                return None;
            }
            let batch_size = max_batch_size.min(queue.len());
            queue.drain(..batch_size).collect::<Vec<_>>()
        };

        Some(handler(batch).await)
    }

    /// Waits until the queue holds at least `min_batch_size` events, or
    /// `timeout` elapses, whichever comes first. Advisory only: callers
    /// must still call `process_batch` to actually drain.
    pub async fn wait_for_batch(&self, min_batch_size: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            if self.size().await >= min_batch_size || Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Drops all queued events.
    pub async fn clear(&self) {
        let mut queue = self.inner.lock().await;
        queue.clear();
    }

    /// Current queue length.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True if the queue currently holds no events.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(agent_id: &str) -> SupervisorEvent {
        SupervisorEvent {
            agent_id: agent_id.to_string(),
            action: "task_completed".to_string(),
            result: Value::Null,
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = SupervisorQueue::new();
        queue.enqueue(event("a")).await;
        queue.enqueue(event("b")).await;
        queue.enqueue(event("c")).await;

        let batch = queue.process_batch(10, |batch| async move { batch }).await;
        let ids: Vec<_> = batch.unwrap().into_iter().map(|e| e.agent_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn batch_size_is_capped() {
        let queue = SupervisorQueue::new();
        for id in ["a", "b", "c", "d"] {
            queue.enqueue(event(id)).await;
        }

        let batch = queue.process_batch(2, |batch| async move { batch }).await;
        assert_eq!(batch.unwrap().len(), 2);
        assert_eq!(queue.size().await, 2);
    }

    #[tokio::test]
    async fn empty_queue_returns_none() {
        let queue = SupervisorQueue::new();
        let result = queue.process_batch(5, |batch| async move { batch }).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn clear_drops_pending_events() {
        let queue = SupervisorQueue::new();
        queue.enqueue(event("a")).await;
        queue.clear().await;
        assert!(queue.is_empty().await);
    }
}
