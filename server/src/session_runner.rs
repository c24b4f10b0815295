//! Drives one user turn to completion: the two-stage search service for
//! `chat`/`web`/`deep_search` modes, or the nine-node research graph
//! (§4.6) for `deep_research`, interleaving `ResearchStreamingGenerator`
//! emits between each stage since neither `SearchService::run` nor the
//! graph node functions emit stream events themselves.
//!
//! Callers are expected to have already appended the inbound user
//! message to `state.chat_store` before calling [`run_turn`], since both
//! pipelines read chat history back out of the store to build context.

use std::sync::Arc;

use dr_graph::{
    analyze_query, apply_execution_outcome, clarify_with_user, compress_findings,
    create_agent_characteristics, execute_agents_node, generate_report, plan_research,
    run_deep_search, ChatTurn, Decision, FinalReport, GraphSettings, SessionState,
};
use dr_search::{Blocklists, SearchMode, SearchService};
use dr_session::{ChatRole, Mode, Session, SessionStatus};
use dr_store::{AgentFileStore, SupervisorQueue};
use dr_streaming::ResearchStreamingGenerator;
use serde_json::json;

use crate::state::AppState;

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Chat => "chat",
        Mode::Web => "web",
        Mode::DeepSearch => "deep_search",
        Mode::DeepResearch => "deep_research",
    }
}

fn search_mode_for(mode: Mode) -> SearchMode {
    match mode {
        Mode::Chat => SearchMode::Chat,
        Mode::Web => SearchMode::Web,
        Mode::DeepSearch => SearchMode::DeepSearch,
        Mode::DeepResearch => SearchMode::DeepResearch,
    }
}

async fn load_chat_history(state: &AppState, session: &Session) -> anyhow::Result<Vec<ChatTurn>> {
    let messages = state.chat_store.messages_for_chat(&session.chat_id).await?;
    Ok(messages
        .into_iter()
        .map(|message| ChatTurn {
            role: match message.role {
                ChatRole::User => "user".to_string(),
                ChatRole::Assistant => "assistant".to_string(),
            },
            content: message.content,
        })
        .collect())
}

fn render_final_report(report: &FinalReport) -> String {
    let mut out = String::new();
    out.push_str("## Executive Summary\n\n");
    out.push_str(&report.executive_summary);
    out.push_str("\n\n");
    for section in &report.sections {
        out.push_str(&format!("## {}\n\n{}\n\n", section.title, section.content));
    }
    out.push_str("## Conclusion\n\n");
    out.push_str(&report.conclusion);
    out.push('\n');
    if !report.sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for source in &report.sources {
            out.push_str(&format!("- {source}\n"));
        }
    }
    out
}

/// Runs `session`'s pipeline to completion, streaming progress over
/// `state.streaming`'s bus for `session.id`, and always terminates with a
/// `done` event (§7: every run, successful or not, ends the stream).
pub async fn run_turn(state: AppState, session: Session, query: String) {
    let bus = state.streaming.bus_for(&session.id.0).await;
    let generator = ResearchStreamingGenerator::new(
        session.id.0.clone(),
        Some(session.chat_id.clone()),
        bus,
        Some(state.chat_store.clone()),
    );

    generator.emit_init(mode_label(session.mode)).await;

    let result = match session.mode {
        Mode::DeepResearch => run_deep_research(&state, &session, &query, &generator).await,
        _ => run_search_mode(&state, &session, &query, &generator).await,
    };

    if let Err(error) = result {
        generator.emit_error(&error.to_string(), None).await;
        let _ = state.sessions.update_status(&session.id, SessionStatus::Cancelled).await;
    }

    state.cancel_tokens.lock().await.remove(&session.id.0);
    let _ = generator.emit_done().await;
    state.streaming.remove(&session.id.0).await;
}

async fn run_search_mode(
    state: &AppState,
    session: &Session,
    query: &str,
    generator: &ResearchStreamingGenerator,
) -> anyhow::Result<()> {
    generator.emit_status("searching", Some("search")).await;

    let mut turns = load_chat_history(state, session).await?;
    let keep_from = turns.len().saturating_sub(state.config.chat_history_limit);
    let history = turns
        .split_off(keep_from)
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    let service: SearchService<_, _> = SearchService::new(
        state.llm.clone(),
        state.embedder.clone(),
        state.search.clone(),
        state.scraper.clone(),
        state.config.blocklists.clone(),
    );

    let outcome = service
        .run(query, &history, Some(search_mode_for(session.mode)))
        .await
        .map_err(anyhow::Error::from)?;

    if !outcome.sources.is_empty() {
        generator
            .emit_search_queries(&[outcome.rewritten_query.clone()], Some("rewritten"))
            .await;
        for source in outcome.sources.iter().take(state.config.sources_limit) {
            generator.emit_source_found("search", &source.url, &source.title).await;
        }
    }

    generator.emit_report_chunk(&outcome.answer).await;
    generator.emit_final_report(&outcome.answer).await?;
    state.sessions.complete_session(&session.id, outcome.answer).await?;
    Ok(())
}

async fn run_deep_research(
    state: &AppState,
    session: &Session,
    query: &str,
    generator: &ResearchStreamingGenerator,
) -> anyhow::Result<()> {
    let mode_config = state.config.mode_budgets.deep_research;
    let settings = GraphSettings {
        num_agents: state.config.mode_budgets.num_agents,
    };

    let store = Arc::new(AgentFileStore::new(state.memory_root.join(&session.id.0)));
    let queue = Arc::new(SupervisorQueue::new());
    let cancel = dr_graph::CancelToken::new();
    state
        .cancel_tokens
        .lock()
        .await
        .insert(session.id.0.clone(), cancel.clone());

    let mut graph_state = SessionState::new(&session.original_query, mode_config);
    graph_state.query = query.to_string();
    graph_state.chat_history = load_chat_history(state, session).await?;
    if let Some(result) = &session.deep_search_result {
        graph_state.deep_search_result = Some(result.clone());
    }
    if session.status == SessionStatus::WaitingClarification {
        graph_state.clarification_needed = true;
        graph_state.clarification_questions = session
            .session_metadata
            .get("clarification_questions")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
    }

    // `DeepSearchService::run_compact` needs its own single-mode search
    // service; the graph nodes below need the full two-stage one for
    // nothing else, but sharing the type keeps the dependency list short.
    let search_service: SearchService<_, _> = SearchService::new(
        state.llm.clone(),
        state.embedder.clone(),
        state.search.clone(),
        state.scraper.clone(),
        Blocklists::default(),
    );

    generator.emit_status("running deep-search prelude", Some("deep_search")).await;
    run_deep_search(&mut graph_state, &search_service)
        .await
        .map_err(anyhow::Error::from)?;
    if let Some(result) = &graph_state.deep_search_result {
        state.sessions.save_deep_search_result(&session.id, result.clone()).await?;
    }

    if cancel.is_cancelled() {
        return Ok(());
    }

    clarify_with_user(&mut graph_state, &state.llm).await.map_err(anyhow::Error::from)?;
    if graph_state.clarification_needed {
        state.sessions.update_status(&session.id, SessionStatus::WaitingClarification).await?;
        state
            .sessions
            .merge_metadata(
                &session.id,
                json!({ "clarification_questions": graph_state.clarification_questions }),
            )
            .await?;
        let report = format!(
            "I need a bit more detail before researching this:\n\n{}",
            graph_state
                .clarification_questions
                .iter()
                .map(|q| format!("- {q}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        generator.emit_status("awaiting clarification", Some("clarify")).await;
        generator.emit_report_chunk(&report).await;
        generator.emit_final_report(&report).await?;
        return Ok(());
    }

    state.sessions.update_status(&session.id, SessionStatus::Researching).await?;

    let analysis = analyze_query(&mut graph_state, &state.llm).await.map_err(anyhow::Error::from)?;
    generator.emit_search_queries(&analysis.topics, Some("analysis")).await;

    plan_research(&mut graph_state, &state.llm, &store, &analysis)
        .await
        .map_err(anyhow::Error::from)?;
    if let Some(plan) = &graph_state.research_plan {
        generator.emit_planning(&plan.reasoning, &graph_state.research_topics).await;
    }

    create_agent_characteristics(&mut graph_state, &state.llm, &store, settings, &analysis)
        .await
        .map_err(anyhow::Error::from)?;
    for (agent_id, characteristic) in &graph_state.agent_characteristics {
        generator.emit_research_start(agent_id, &characteristic.expertise).await;
    }

    let outcome = execute_agents_node(
        state.llm.clone(),
        store.clone(),
        queue,
        state.search.clone(),
        state.scraper.clone(),
        &mut graph_state,
        &cancel,
    )
    .await
    .map_err(anyhow::Error::from)?;

    let findings_count = outcome.findings.len();
    for finding in &outcome.findings {
        generator
            .emit_finding(&finding.agent_id, &finding.topic, &finding.summary, findings_count)
            .await;
    }
    generator
        .emit_supervisor_react(
            "executor cycle complete",
            matches!(outcome.final_decision, Decision::Continue),
            &[],
        )
        .await;

    apply_execution_outcome(&mut graph_state, &outcome);

    compress_findings(&mut graph_state, &state.llm).await.map_err(anyhow::Error::from)?;
    if let Some(compressed) = &graph_state.compressed_research {
        generator.emit_compression(&compressed.synthesis).await;
    }

    generate_report(&mut graph_state, &state.llm, &store)
        .await
        .map_err(anyhow::Error::from)?;
    let final_report = graph_state
        .final_report
        .clone()
        .expect("generate_report always sets final_report");
    let rendered = render_final_report(&final_report);

    generator.emit_report_chunk(&rendered).await;
    generator.emit_final_report(&rendered).await?;
    state.sessions.complete_session(&session.id, rendered).await?;
    Ok(())
}
