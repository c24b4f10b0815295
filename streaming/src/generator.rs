//! `ResearchStreamingGenerator` (§4.8): typed `emit_*` helpers over a
//! [`SessionBus`], plus accumulation of report chunks so the final
//! message can be persisted once the stream completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dr_session::{ChatMessage, ChatRole, ChatStore};
use serde_json::json;
use tokio::sync::Mutex;

use crate::bus::SessionBus;
use crate::error::StreamingError;
use crate::event::{StreamEvent, StreamEventType};

/// Maximum characters per `report_chunk` event (§4.8 chunking rule).
pub const MAX_CHUNK_LEN: usize = 10_000;

/// The largest byte index `<= max_bytes` that lands on a char boundary
/// of `s`, so callers can slice without risking a panic on multi-byte
/// UTF-8 content.
fn floor_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Truncates `s` to at most `max_bytes` bytes, never splitting a char,
/// appending `...` when truncation occurred.
#[must_use]
pub fn truncate_preview(s: &str, max_bytes: usize) -> String {
    let cut = floor_char_boundary(s, max_bytes);
    if cut >= s.len() {
        s.to_string()
    } else {
        format!("{}...", &s[..cut])
    }
}

/// Splits `text` into chunks of at most `MAX_CHUNK_LEN` characters,
/// preferring to break on a newline near the boundary.
#[must_use]
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max_len {
        let window_end = floor_char_boundary(rest, max_len);
        let split_at = rest[..window_end]
            .rfind('\n')
            .filter(|&idx| idx > max_len / 2)
            .unwrap_or(window_end);
        let (head, tail) = rest.split_at(split_at);
        chunks.push(head.to_string());
        rest = tail.trim_start_matches('\n');
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Current time as epoch milliseconds.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Typed event emitter for one research session's stream. Accumulates
/// report chunks so `done` can fall back to saving whatever was streamed
/// even if `emit_final_report` was never called (client disconnect, mode
/// without a structured final report, etc.).
pub struct ResearchStreamingGenerator {
    session_id: String,
    chat_id: Option<String>,
    bus: SessionBus,
    chat_store: Option<Arc<dyn ChatStore>>,
    accumulated: Mutex<String>,
    final_saved: AtomicBool,
}

impl ResearchStreamingGenerator {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        chat_id: Option<String>,
        bus: SessionBus,
        chat_store: Option<Arc<dyn ChatStore>>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            chat_id,
            bus,
            chat_store,
            accumulated: Mutex::new(String::new()),
            final_saved: AtomicBool::new(false),
        }
    }

    async fn emit(&self, event_type: StreamEventType, data: serde_json::Value) {
        self.bus
            .emit(StreamEvent {
                session_id: self.session_id.clone(),
                event_type,
                timestamp_ms: now_ms(),
                data,
            })
            .await;
    }

    pub async fn emit_init(&self, mode: &str) {
        self.emit(
            StreamEventType::Init,
            json!({ "mode": mode, "session_id": self.session_id }),
        )
        .await;
    }

    pub async fn emit_status(&self, message: &str, step: Option<&str>) {
        self.emit(StreamEventType::Status, json!({ "message": message, "step": step }))
            .await;
    }

    pub async fn emit_memory_context(&self, context_count: usize, preview: serde_json::Value) {
        self.emit(
            StreamEventType::MemorySearch,
            json!({ "context_count": context_count, "preview": preview }),
        )
        .await;
    }

    pub async fn emit_search_queries(&self, queries: &[String], label: Option<&str>) {
        self.emit(
            StreamEventType::SearchQueries,
            json!({ "queries": queries, "count": queries.len(), "label": label }),
        )
        .await;
    }

    pub async fn emit_planning(&self, reasoning: &str, topics: &[String]) {
        self.emit(
            StreamEventType::Planning,
            json!({ "reasoning": reasoning, "topics": topics, "topic_count": topics.len() }),
        )
        .await;
    }

    pub async fn emit_research_start(&self, researcher_id: &str, topic: &str) {
        self.emit(
            StreamEventType::ResearchStart,
            json!({ "researcher_id": researcher_id, "topic": topic }),
        )
        .await;
    }

    pub async fn emit_source_found(&self, researcher_id: &str, url: &str, title: &str) {
        self.emit(
            StreamEventType::SourceFound,
            json!({ "researcher_id": researcher_id, "url": url, "title": title }),
        )
        .await;
    }

    pub async fn emit_finding(&self, researcher_id: &str, topic: &str, summary: &str, findings_count: usize) {
        let preview = truncate_preview(summary, 240);
        self.emit(
            StreamEventType::Finding,
            json!({
                "researcher_id": researcher_id,
                "topic": topic,
                "summary": summary,
                "summary_preview": preview,
                "findings_count": findings_count,
            }),
        )
        .await;
    }

    pub async fn emit_supervisor_react(&self, reasoning: &str, should_continue: bool, gaps: &[String]) {
        self.emit(
            StreamEventType::SupervisorReact,
            json!({ "reasoning": reasoning, "should_continue": should_continue, "gaps": gaps }),
        )
        .await;
    }

    pub async fn emit_agent_todo(&self, researcher_id: &str, pending: usize, completed: usize, todos: serde_json::Value) {
        self.emit(
            StreamEventType::AgentTodo,
            json!({
                "researcher_id": researcher_id,
                "todos": todos,
                "pending": pending,
                "completed": completed,
            }),
        )
        .await;
    }

    pub async fn emit_agent_note(&self, researcher_id: &str, note: serde_json::Value) {
        self.emit(
            StreamEventType::AgentNote,
            json!({ "researcher_id": researcher_id, "note": note }),
        )
        .await;
    }

    pub async fn emit_compression(&self, synthesis: &str) {
        let preview = truncate_preview(synthesis, 300);
        self.emit(StreamEventType::Compression, json!({ "preview": preview })).await;
    }

    /// Emits one report chunk and accumulates it for end-of-stream
    /// persistence. Splits `content` itself if it exceeds
    /// [`MAX_CHUNK_LEN`], so callers may hand this whole sections at once.
    pub async fn emit_report_chunk(&self, content: &str) {
        for piece in chunk_text(content, MAX_CHUNK_LEN) {
            self.emit(StreamEventType::ReportChunk, json!({ "content": piece })).await;
        }
        self.accumulated.lock().await.push_str(content);
    }

    pub async fn emit_final_report(&self, report: &str) -> Result<(), StreamingError> {
        let preview = truncate_preview(report, 500);
        self.emit(
            StreamEventType::FinalReport,
            json!({ "report": report, "length": report.len(), "preview": preview }),
        )
        .await;
        self.final_saved.store(true, Ordering::Relaxed);
        self.save_assistant_message(report).await
    }

    pub async fn emit_supervisor_directive(&self, agent_id: &str, directive: &str) {
        self.emit(
            StreamEventType::SupervisorDirective,
            json!({ "agent_id": agent_id, "directive": directive }),
        )
        .await;
    }

    pub async fn emit_agent_action(&self, agent_id: &str, tool: &str, arguments: serde_json::Value) {
        self.emit(
            StreamEventType::AgentAction,
            json!({ "agent_id": agent_id, "tool": tool, "arguments": arguments }),
        )
        .await;
    }

    pub async fn emit_agent_reasoning(&self, agent_id: &str, reasoning: &str) {
        self.emit(
            StreamEventType::AgentReasoning,
            json!({ "agent_id": agent_id, "reasoning": reasoning }),
        )
        .await;
    }

    pub async fn emit_replan(&self, reasoning: &str) {
        self.emit(StreamEventType::Replan, json!({ "reasoning": reasoning })).await;
    }

    pub async fn emit_gap_identified(&self, gap: &str) {
        self.emit(StreamEventType::GapIdentified, json!({ "gap": gap })).await;
    }

    pub async fn emit_debug(&self, payload: serde_json::Value) {
        self.emit(StreamEventType::Debug, payload).await;
    }

    pub async fn emit_error(&self, error: &str, details: Option<&str>) {
        tracing::error!(session_id = %self.session_id, error, details, "research stream error");
        self.emit(StreamEventType::Error, json!({ "error": error, "details": details }))
            .await;
    }

    /// Emits `done` and, if no structured final report was ever emitted,
    /// falls back to persisting whatever report text was streamed.
    pub async fn emit_done(&self) -> Result<(), StreamingError> {
        self.emit(StreamEventType::Done, json!({})).await;

        if !self.final_saved.load(Ordering::Relaxed) {
            let accumulated = self.accumulated.lock().await.clone();
            if !accumulated.trim().is_empty() {
                return self.save_assistant_message(&accumulated).await;
            }
        }
        Ok(())
    }

    async fn save_assistant_message(&self, content: &str) -> Result<(), StreamingError> {
        let (Some(store), Some(chat_id)) = (&self.chat_store, &self.chat_id) else {
            return Ok(());
        };
        if content.trim().is_empty() {
            return Ok(());
        }
        let message_id = format!("assistant_{}_{}", self.session_id, now_ms());
        store
            .upsert_message(ChatMessage {
                chat_id: chat_id.clone(),
                message_id,
                role: ChatRole::Assistant,
                content: content.to_string(),
                created_at: now_ms(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello", MAX_CHUNK_LEN);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn long_text_splits_on_newlines_near_the_boundary() {
        let line = "x".repeat(20);
        let text = std::iter::repeat(line).take(50).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text(&text, 100);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn chunking_never_panics_on_multibyte_boundaries() {
        let text = "日".repeat(5000);
        let chunks = chunk_text(&text, MAX_CHUNK_LEN);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn preview_truncates_and_marks_it() {
        let preview = truncate_preview(&"a".repeat(1000), 240);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), 243);
    }

    #[test]
    fn preview_passes_short_text_through_unchanged() {
        assert_eq!(truncate_preview("short", 240), "short");
    }
}
