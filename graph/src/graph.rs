//! Research graph orchestrator (C6): the nine nodes of §4.6, threaded
//! over a shared [`SessionState`].

use std::sync::Arc;

use dr_core::LanguageModel;
use dr_core::llm::{LLMRequest, Message};
use dr_store::{AgentFile, AgentFileStore, Priority, SupervisorQueue, Todo, TodoStatus};

use crate::error::GraphError;
use crate::executor::{execute_agents, CancelToken, ExecutionOutcome};
use crate::provider::{DeepSearchService, Scraper, SearchProvider};
use crate::state::{
    AgentCharacteristic, ChatTurn, ClarificationNeeds, CompressedFindings, FinalReport,
    QueryAnalysis, ResearchPlan, SessionState,
};
use crate::supervisor::Decision;

/// Settings that bound `create_agent_characteristics` and downstream
/// execution, independent of the per-mode iteration budgets already
/// carried on `SessionState::mode_config`.
#[derive(Debug, Clone, Copy)]
pub struct GraphSettings {
    /// Hard ceiling on the number of researcher agents ever created.
    pub num_agents: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self { num_agents: 5 }
    }
}

/// Node 1: optional memory lookup. A no-op when no memory backend is
/// wired in; `memory_context` stays absent and every downstream node
/// simply does not see prior-session context.
pub fn search_memory(_state: &SessionState) -> Option<String> {
    None
}

/// Node 2: one-shot compact deep search, with the §4.6 idempotence rule:
/// if the chat history already holds the combined deep-search +
/// clarification message and a later user turn answered it, this is a
/// no-op that passes the existing result through unchanged.
pub async fn run_deep_search(
    state: &mut SessionState,
    deep_search: &dyn DeepSearchService,
) -> Result<(), GraphError> {
    if resumed_after_clarification(state) {
        return Ok(());
    }
    if state.deep_search_result.is_some() {
        return Ok(());
    }

    let result = deep_search
        .run_compact(&state.query)
        .await
        .map_err(GraphError::StructuredOutput)?;
    state.deep_search_result = Some(result);
    Ok(())
}

/// True once a combined deep-search+clarification assistant turn is
/// already present in history *and* a user turn follows it.
fn resumed_after_clarification(state: &SessionState) -> bool {
    let Some(assistant_idx) = state
        .chat_history
        .iter()
        .position(|t| t.role == "assistant" && t.content.contains("\n\n\n\n"))
    else {
        return false;
    };
    state.chat_history[assistant_idx + 1..]
        .iter()
        .any(|t| t.role == "user")
}

/// The last user turn, if any, that is not the original query itself.
fn latest_user_answer(state: &SessionState) -> Option<&str> {
    state
        .chat_history
        .iter()
        .rev()
        .find(|t| t.role == "user" && t.content != state.original_query)
        .map(|t| t.content.as_str())
}

/// Node 3: decide whether the query needs clarification, and if so,
/// interrupt. On resume (a new user turn has arrived answering the
/// question), records the answer and proceeds without re-asking.
pub async fn clarify_with_user<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
) -> Result<(), GraphError> {
    if state.clarification_needed {
        if let Some(answer) = latest_user_answer(state) {
            state.clarification_answers_push(answer);
            state.clarification_needed = false;
        }
        return Ok(());
    }

    let prompt = format!(
        "Original query: {}\n\nDeep search context:\n{}\n\nDecide whether 2-3 \
         clarifying questions are needed before research can begin. Ask only \
         about the query itself, in the user's own language.",
        state.original_query,
        state.deep_search_result.as_deref().unwrap_or("(none)")
    );
    let needs: ClarificationNeeds = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    if needs.clarification_needed && !needs.questions.is_empty() {
        state.clarification_needed = true;
        state.clarification_questions = needs.questions;
    }
    Ok(())
}

/// Node 4: structured query analysis, honouring any clarification answers
/// already folded into `state.chat_history`.
pub async fn analyze_query<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
) -> Result<QueryAnalysis, GraphError> {
    let answers = state
        .chat_history
        .iter()
        .filter(|t| t.role == "user" && t.content != state.original_query)
        .map(|t| t.content.clone())
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Original query: {}\nClarification answers: {}\n\nIdentify the distinct \
         topics in this query, assess its complexity, and estimate how many \
         researcher agents are warranted.",
        state.original_query, answers
    );
    let analysis: QueryAnalysis = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    state.research_topics = analysis.topics.clone();
    Ok(analysis)
}

/// Node 5: structured research plan, persisted to the shared main
/// document under a "Research Plan" heading.
pub async fn plan_research<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
    store: &AgentFileStore,
    analysis: &QueryAnalysis,
) -> Result<(), GraphError> {
    let prompt = format!(
        "Original query: {}\nTopics: {:?}\nComplexity: {}\n\nProduce a research \
         plan: per-topic priority and estimated sources, overall reasoning, and \
         a coordination strategy that avoids overlap between agents.",
        state.original_query, analysis.topics, analysis.complexity
    );
    let plan: ResearchPlan = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    let mut main = store.read_agent_file("main").await?;
    let mut doc = main.character.unwrap_or_default();
    doc.push_str("\n\n## Research Plan\n\n");
    doc.push_str(&plan.reasoning);
    doc.push_str(&format!("\n\nCoordination: {}\n", plan.coordination_strategy));
    for topic in &plan.topics {
        doc.push_str(&format!(
            "- [{}] {} (~{} sources)\n",
            topic.priority, topic.description, topic.estimated_sources
        ));
    }
    main.character = Some(doc);
    store.write_agent_file("main", &main).await?;

    state.research_plan = Some(plan);
    Ok(())
}

/// Node 6: generates `N = min(llm_estimated_count, settings.num_agents)`
/// specialist profiles, pads missing agents with fallback roles derived
/// from uncovered topics, and seeds each agent's todo file.
pub async fn create_agent_characteristics<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
    store: &AgentFileStore,
    settings: GraphSettings,
    analysis: &QueryAnalysis,
) -> Result<(), GraphError> {
    let n = analysis.estimated_agent_count.clamp(1, settings.num_agents);

    let prompt = format!(
        "Original query: {}\nTopics: {:?}\n\nGenerate exactly {n} specialist \
         researcher profiles, each with a unique role, area of expertise, a \
         short personality/voice blurb, and 2-3 unique initial todo titles. \
         Every profile must cover a distinct topic; do not duplicate roles.",
        state.original_query, analysis.topics
    );

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct Profiles {
        agents: Vec<AgentCharacteristic>,
    }

    let mut profiles: Profiles = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    // I3/I4: de-duplicate agent ids and pad to `n` with fallback roles
    // derived from topics no profile claimed.
    let mut seen_ids = std::collections::HashSet::new();
    for (idx, profile) in profiles.agents.iter_mut().enumerate() {
        if profile.agent_id.trim().is_empty() || !seen_ids.insert(profile.agent_id.clone()) {
            profile.agent_id = format!("agent_{idx}");
            seen_ids.insert(profile.agent_id.clone());
        }
    }
    profiles.agents.truncate(n);

    let covered: std::collections::HashSet<&str> =
        profiles.agents.iter().map(|a| a.role.as_str()).collect();
    let mut fallback_topics = analysis
        .topics
        .iter()
        .filter(|t| !covered.contains(t.as_str()));

    while profiles.agents.len() < n {
        let idx = profiles.agents.len();
        let topic = fallback_topics
            .next()
            .cloned()
            .unwrap_or_else(|| state.original_query.clone());
        let agent_id = format!("agent_{idx}");
        profiles.agents.push(AgentCharacteristic {
            agent_id: agent_id.clone(),
            role: format!("General researcher: {topic}"),
            expertise: topic.clone(),
            personality: "Methodical and thorough.".to_string(),
            initial_todos: vec![format!("Investigate: {topic}")],
        });
        seen_ids.insert(agent_id);
    }

    for profile in &profiles.agents {
        let mut file = AgentFile::default();
        file.character = Some(format!(
            "Role: {}\nExpertise: {}\nPersonality: {}",
            profile.role, profile.expertise, profile.personality
        ));
        for title in &profile.initial_todos {
            // Every task's objective quotes the original query (I-series
            // requirement that researchers stay anchored to it).
            file.todos.push(Todo::new(
                format!("Seeded from research plan for {}", profile.role),
                title.clone(),
                format!("In service of: \"{}\". {title}", state.original_query),
                "A concise written finding with cited sources.".to_string(),
                Priority::Medium,
            ));
        }
        store.write_agent_file(&profile.agent_id, &file).await?;
        state
            .agent_characteristics
            .insert(profile.agent_id.clone(), profile.clone());
    }

    Ok(())
}

/// Node 7: runs the parallel executor to completion (§4.6.1).
pub async fn execute_agents_node<LLM: LanguageModel + Clone>(
    llm: LLM,
    store: Arc<AgentFileStore>,
    queue: Arc<SupervisorQueue>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    state: &mut SessionState,
    cancel: &CancelToken,
) -> Result<ExecutionOutcome, GraphError> {
    execute_agents(llm, store, queue, search, scraper, state, cancel).await
}

/// Node 8: structured synthesis over every collected finding.
pub async fn compress_findings<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
) -> Result<(), GraphError> {
    let digest = state
        .agent_findings
        .iter()
        .map(|f| format!("### {} ({})\n{}", f.topic, f.agent_id, f.summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!(
        "Original query: {}\n\nFindings:\n{digest}\n\nWrite an 800-1200 word \
         synthesis across all findings, the key recurring themes, and the \
         sources most important to keep visible in the final report.",
        state.original_query
    );
    let compressed: CompressedFindings = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    state.compressed_research = Some(compressed);
    Ok(())
}

/// Node 9: structured final report, falling back to the working draft
/// when the LLM's output falls under the length floor.
pub async fn generate_report<LLM: LanguageModel>(
    state: &mut SessionState,
    llm: &LLM,
    store: &AgentFileStore,
) -> Result<(), GraphError> {
    let synthesis = state
        .compressed_research
        .as_ref()
        .map(|c| c.synthesis.as_str())
        .unwrap_or_default();

    let prompt = format!(
        "Original query: {}\n\nSynthesis:\n{synthesis}\n\nWrite the final report: \
         a 200-400 word executive summary, at least 3 sections of 300-800 words \
         each, a 200-400 word conclusion, the sources cited, and an overall \
         confidence assessment.",
        state.original_query
    );
    let report: FinalReport = llm
        .generate(LLMRequest::new([Message::user(prompt)]))
        .await
        .map_err(GraphError::StructuredOutput)?;

    const LENGTH_FLOOR: usize = 600;
    let total_len: usize = report.sections.iter().map(|s| s.content.len()).sum();

    if total_len < LENGTH_FLOOR {
        let draft = store.read_agent_file("draft_report").await?;
        if let Some(raw) = draft.preferences {
            tracing::warn!("generated report under length floor, falling back to draft");
            let fallback = crate::supervisor::normalize_draft_report(&raw);
            state.final_report = Some(FinalReport {
                executive_summary: report.executive_summary,
                sections: vec![crate::state::ReportSection {
                    title: "Research Draft".to_string(),
                    content: fallback,
                }],
                conclusion: report.conclusion,
                sources: report.sources,
                confidence: report.confidence,
            });
            return Ok(());
        }
    }

    state.final_report = Some(report);
    Ok(())
}

impl SessionState {
    /// Records an answer the user gave in response to `clarify_with_user`'s
    /// questions, and appends it to chat history for downstream nodes.
    pub fn clarification_answers_push(&mut self, answer: &str) {
        self.chat_history.push(ChatTurn {
            role: "user".to_string(),
            content: answer.to_string(),
        });
    }
}

/// Reconciles the executor's terminal decision into the state flags the
/// remaining nodes (`compress_findings`, `generate_report`) read.
pub fn apply_execution_outcome(state: &mut SessionState, outcome: &ExecutionOutcome) {
    state.should_continue = matches!(outcome.final_decision, Decision::Continue);
    state.replanning_needed = matches!(outcome.final_decision, Decision::Replan);
}

/// Where a full graph run landed: either interrupted waiting on the user,
/// or carried through to a finished report.
pub enum GraphOutcome {
    /// `clarify_with_user` raised questions the caller must answer before
    /// the graph can proceed past `analyze_query`.
    NeedsClarification(Vec<String>),
    /// The graph ran every node to completion.
    Completed(FinalReport),
}

/// Drives every node from `search_memory` through `generate_report` in
/// sequence, honouring the clarification interrupt contract in §4.6 node 3.
#[allow(clippy::too_many_arguments)]
pub async fn run_graph<LLM: LanguageModel + Clone>(
    llm: LLM,
    store: Arc<AgentFileStore>,
    queue: Arc<SupervisorQueue>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    deep_search: &dyn DeepSearchService,
    settings: GraphSettings,
    cancel: &CancelToken,
    state: &mut SessionState,
) -> Result<GraphOutcome, GraphError> {
    let _memory_context = search_memory(state);

    run_deep_search(state, deep_search).await?;

    clarify_with_user(state, &llm).await?;
    if state.clarification_needed {
        return Ok(GraphOutcome::NeedsClarification(
            state.clarification_questions.clone(),
        ));
    }

    let analysis = analyze_query(state, &llm).await?;
    plan_research(state, &llm, &store, &analysis).await?;
    create_agent_characteristics(state, &llm, &store, settings, &analysis).await?;

    let outcome = execute_agents_node(
        llm.clone(),
        store.clone(),
        queue,
        search,
        scraper,
        state,
        cancel,
    )
    .await?;
    apply_execution_outcome(state, &outcome);

    compress_findings(state, &llm).await?;
    generate_report(state, &llm, &store).await?;

    Ok(GraphOutcome::Completed(
        state.final_report.clone().expect("generate_report always sets final_report"),
    ))
}

/// Marks every todo belonging to `agent_id` still `in_progress` as
/// abandoned (`pending`) after a cancelled run, so a future resume can
/// pick them back up.
pub async fn reset_in_progress_todos(
    store: &AgentFileStore,
    agent_id: &str,
) -> Result<(), GraphError> {
    let file = store.read_agent_file(agent_id).await?;
    for todo in file.todos.iter().filter(|t| t.status == TodoStatus::InProgress) {
        let title = todo.title.clone();
        store
            .update_agent_todo(agent_id, &title, |t| t.status = TodoStatus::Pending)
            .await?;
    }
    Ok(())
}
