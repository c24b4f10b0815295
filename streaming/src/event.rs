//! The closed set of streamed event types (§4.8) and the envelope every
//! event is wrapped in before serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event kind the streaming layer can emit. Closed set — adding a
/// new kind is a deliberate protocol change, not something callers do
/// freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Stream opened; carries the session's mode.
    Init,
    /// Free-text progress update.
    Status,
    /// Prior-session memory lookup results.
    MemorySearch,
    /// The search queries a node is about to run.
    SearchQueries,
    /// The research plan.
    Planning,
    /// A researcher agent started on a topic.
    ResearchStart,
    /// Alias of `ResearchStart` carrying a topic label (kept distinct so
    /// older clients that only understand one of the two still work).
    ResearchTopic,
    /// A source was collected.
    SourceFound,
    /// A researcher finished a todo and produced a finding.
    Finding,
    /// An agent's todo list changed.
    AgentTodo,
    /// An agent wrote a note.
    AgentNote,
    /// The compression node produced a synthesis.
    Compression,
    /// One chunk of the final report, for incremental rendering.
    ReportChunk,
    /// The complete final report.
    FinalReport,
    /// An error occurred.
    Error,
    /// The stream is complete; no further events follow.
    Done,
    /// The supervisor's reasoning for a review decision.
    SupervisorReact,
    /// A directive the supervisor issued to an agent.
    SupervisorDirective,
    /// A tool call an agent made.
    AgentAction,
    /// An agent's visible reasoning text.
    AgentReasoning,
    /// The supervisor requested a new plan.
    Replan,
    /// The supervisor flagged a coverage gap.
    GapIdentified,
    /// Low-level diagnostic payload, only emitted in debug mode.
    Debug,
    /// A checkpoint of the full graph state, for UIs that render the
    /// whole session rather than incremental events.
    GraphStateUpdate,
}

/// A single event, wrapped with session id and timestamp, ready to be
/// serialized as the `data:` line of an SSE frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// The session this event belongs to.
    pub session_id: String,
    /// What kind of event this is.
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    /// Epoch milliseconds when the event was created.
    pub timestamp_ms: u64,
    /// Event-specific payload.
    pub data: Value,
}

impl StreamEvent {
    /// Renders this event as one SSE frame (`data: <json>\n\n`).
    #[must_use]
    pub fn to_sse_frame(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {body}\n\n")
    }
}
