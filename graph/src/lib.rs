//! Research graph orchestrator: the researcher and supervisor agents,
//! the parallel executor that interleaves them, and the node graph that
//! drives a session from a raw query to a final report (C2, C3, C6).

mod error;
mod executor;
mod finding;
mod graph;
mod provider;
mod researcher;
mod state;
mod supervisor;

pub use error::GraphError;
pub use executor::{execute_agents, CancelToken, ExecutionOutcome};
pub use finding::{Confidence, Finding, Source};
pub use graph::{
    analyze_query, apply_execution_outcome, clarify_with_user, compress_findings,
    create_agent_characteristics, execute_agents_node, generate_report, plan_research,
    reset_in_progress_todos, run_deep_search, run_graph, search_memory, GraphOutcome,
    GraphSettings,
};
pub use provider::{DeepSearchService, ScrapedPage, Scraper, SearchHit, SearchProvider};
pub use researcher::run_researcher;
pub use state::{
    AgentCharacteristic, ChatTurn, ClarificationNeeds, CompressedFindings, FinalReport,
    ModeConfig, QueryAnalysis, ReportSection, ResearchPlan, ResearchTopic, SessionState,
};
pub use supervisor::{run_supervisor, Decision};
