//! `SessionState` (§3) and the structured-output shapes the graph nodes
//! request from the LLM.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::finding::Finding;

/// One turn of chat history, as seen by the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `"user"` or `"assistant"`.
    pub role: String,
    /// Turn content.
    pub content: String,
}

/// Per-mode iteration/concurrency budgets (§6 environment variables).
#[derive(Debug, Clone, Copy)]
pub struct ModeConfig {
    /// Maximum executor cycles (§4.6.1 `max_iterations`).
    pub max_iterations: usize,
    /// Maximum concurrently-running researchers.
    pub max_concurrent: usize,
    /// Maximum supervisor todo-mutating calls before forced finalisation.
    pub max_supervisor_calls: usize,
    /// Maximum ReAct steps per researcher invocation (§4.2 step 3).
    pub agent_max_steps: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            max_concurrent: 4,
            max_supervisor_calls: 40,
            agent_max_steps: 8,
        }
    }
}

/// One specialist profile generated by `create_agent_characteristics`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentCharacteristic {
    /// Stable agent id (also the file-store key).
    pub agent_id: String,
    /// Role label, e.g. "Economic historian".
    pub role: String,
    /// Area of expertise this agent covers.
    pub expertise: String,
    /// Short personality/voice blurb injected into its system prompt.
    pub personality: String,
    /// Initial todo titles seeded for this agent (2-3 per §4.6 step 6).
    pub initial_todos: Vec<String>,
}

/// Structured output of the `clarify_with_user` node's LLM call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClarificationNeeds {
    /// Whether clarification is needed at all.
    pub clarification_needed: bool,
    /// 2-3 questions, in the user's language, strictly about the query.
    pub questions: Vec<String>,
}

/// Structured output of the `analyze_query` node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryAnalysis {
    /// Distinct topics identified in the query.
    pub topics: Vec<String>,
    /// Coarse complexity assessment.
    pub complexity: String,
    /// The model's estimate of how many researcher agents are warranted.
    pub estimated_agent_count: usize,
}

/// One topic in a `ResearchPlan`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResearchTopic {
    /// Topic title.
    pub description: String,
    /// Relative priority among sibling topics.
    pub priority: String,
    /// Rough estimate of sources needed to cover it.
    pub estimated_sources: usize,
}

/// Structured output of the `plan_research` node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResearchPlan {
    /// The topics to be covered.
    pub topics: Vec<ResearchTopic>,
    /// Why the plan is shaped this way.
    pub reasoning: String,
    /// How agents should coordinate (e.g. "divide by topic, no overlap").
    pub coordination_strategy: String,
}

/// Structured output of the `compress_findings` node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompressedFindings {
    /// 800-1200 word synthesis across all findings.
    pub synthesis: String,
    /// Key recurring themes.
    pub key_themes: Vec<String>,
    /// Sources judged most important to keep visible in the final report.
    pub important_sources: Vec<String>,
}

/// One section of a `FinalReport`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportSection {
    /// Section heading.
    pub title: String,
    /// Section body, 300-800 words.
    pub content: String,
}

/// Structured output of the `generate_report` node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinalReport {
    /// 200-400 word executive summary.
    pub executive_summary: String,
    /// At least 3 sections.
    pub sections: Vec<ReportSection>,
    /// 200-400 word conclusion.
    pub conclusion: String,
    /// Sources cited across the report.
    pub sources: Vec<String>,
    /// Overall confidence assessment.
    pub confidence: String,
}

/// The in-memory, per-node-checkpointed state threaded through the graph
/// (§3 `SessionState`).
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current working query (may be rewritten by clarification).
    pub query: String,
    /// The user's original, unmodified query.
    pub original_query: String,
    /// Detected language of the user's query, for response matching.
    pub user_language: Option<String>,
    /// Ordered chat history for this session.
    pub chat_history: Vec<ChatTurn>,
    /// Per-mode budgets.
    pub mode_config: Option<ModeConfig>,
    /// Current graph iteration (executor cycle count).
    pub iteration: usize,
    /// Hard ceiling on `iteration` (mirrors `mode_config.max_iterations`).
    pub max_iterations: usize,
    /// Supervisor todo-mutating call count so far (§4.3 call accounting).
    pub supervisor_call_count: usize,
    /// Hard ceiling on `supervisor_call_count`.
    pub max_supervisor_calls: usize,
    /// The plan produced by `plan_research`.
    pub research_plan: Option<ResearchPlan>,
    /// Topics pulled out of `research_plan` for quick lookup.
    pub research_topics: Vec<String>,
    /// Specialist profiles keyed by agent id.
    pub agent_characteristics: HashMap<String, AgentCharacteristic>,
    /// Append-only list of findings collected so far.
    pub agent_findings: Vec<Finding>,
    /// Whether `clarify_with_user` decided clarification is required.
    pub clarification_needed: bool,
    /// The questions asked, if clarification was needed.
    pub clarification_questions: Vec<String>,
    /// Output of the one-shot deep-search prelude.
    pub deep_search_result: Option<String>,
    /// Output of `compress_findings`.
    pub compressed_research: Option<CompressedFindings>,
    /// Output of `generate_report`.
    pub final_report: Option<FinalReport>,
    /// Whether the executor should keep cycling.
    pub should_continue: bool,
    /// Set by the supervisor's `replan` decision.
    pub replanning_needed: bool,
}

/// Current time as epoch milliseconds, for queue event timestamps.
#[must_use]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl SessionState {
    /// Starts a fresh state for a new research session.
    #[must_use]
    pub fn new(query: impl Into<String>, mode_config: ModeConfig) -> Self {
        let query = query.into();
        Self {
            original_query: query.clone(),
            query,
            max_iterations: mode_config.max_iterations,
            max_supervisor_calls: mode_config.max_supervisor_calls,
            mode_config: Some(mode_config),
            should_continue: true,
            ..Self::default()
        }
    }

    /// True once every known agent has no pending or in-progress todos,
    /// per the "all agents idle" liveness condition in §4.6.1.
    #[must_use]
    pub fn reached_iteration_cap(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// True once the supervisor call budget is exhausted (§4.3, §5).
    #[must_use]
    pub fn reached_supervisor_cap(&self) -> bool {
        self.supervisor_call_count >= self.max_supervisor_calls
    }
}
