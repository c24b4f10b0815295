//! Parallel agent executor (§4.6.1): runs every known researcher to
//! completion concurrently under a semaphore, then routes each finding
//! (and any queued events) through one supervisor review call, cycling
//! until the supervisor decides to finish, the iteration cap is hit, or
//! the session is cancelled.

use std::sync::Arc;
use std::time::Duration;

use dr_core::LanguageModel;
use dr_store::{AgentFileStore, SupervisorQueue};
use tokio::sync::Semaphore;

use crate::error::GraphError;
use crate::finding::Finding;
use crate::researcher::run_researcher;
use crate::state::SessionState;
use crate::supervisor::{run_supervisor, Decision};
use crate::provider::{Scraper, SearchProvider};

/// Cooperative cancellation point shared with the owning session.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<std::sync::atomic::AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Outcome of running `execute_agents` to completion.
pub struct ExecutionOutcome {
    pub findings: Vec<Finding>,
    pub final_decision: Decision,
    pub iterations_run: usize,
}

/// Drives the cycle loop described in §4.6.1.
///
/// Each cycle: discover agent ids from the file store (including any the
/// supervisor created mid-run), launch every agent with pending work
/// concurrently under a `max_concurrent` semaphore, and as each completes,
/// append its finding and immediately run one supervisor review with that
/// finding plus any events queued by other agents in the meantime. A
/// `finish` decision is overridden back to `continue` if new todos exist
/// across any agent (the supervisor may have created follow-up work while
/// reviewing). The loop also ends once every known agent has no
/// pending/in-progress todos (mandatory finalisation) or `max_iterations`
/// cycles have run.
#[allow(clippy::too_many_arguments)]
pub async fn execute_agents<LLM: LanguageModel + Clone>(
    llm: LLM,
    store: Arc<AgentFileStore>,
    queue: Arc<SupervisorQueue>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    state: &mut SessionState,
    cancel: &CancelToken,
) -> Result<ExecutionOutcome, GraphError> {
    let mode_config = state.mode_config.unwrap_or_default();
    let mut findings = Vec::new();
    let mut final_decision = Decision::Continue;
    let mut cycle = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        if cycle >= state.max_iterations {
            break;
        }

        let agent_ids = store.list_agent_ids().await?;
        let runnable: Vec<String> = agent_ids
            .into_iter()
            .filter(|id| id != "main" && id != "draft_report" && id != "supervisor")
            .collect();

        if runnable.is_empty() {
            break;
        }

        let semaphore = Arc::new(Semaphore::new(mode_config.max_concurrent.max(1)));
        let mut tasks = tokio::task::JoinSet::new();

        for agent_id in runnable {
            let llm = llm.clone();
            let store = store.clone();
            let queue = queue.clone();
            let search = search.clone();
            let scraper = scraper.clone();
            let semaphore = semaphore.clone();
            let max_steps = mode_config.agent_max_steps;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                run_researcher(llm, &agent_id, store, queue, search, scraper, max_steps).await
            });
        }

        let mut any_pending_after_cycle = false;

        while let Some(joined) = tasks.join_next().await {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }

            let finding = match joined {
                Ok(Ok(finding)) => finding,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "researcher task failed, skipping");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "researcher task panicked, skipping");
                    continue;
                }
            };

            findings.push(finding.clone());
            state.agent_findings.push(finding.clone());

            let mut batch_events = Vec::new();
            queue
                .process_batch(64, |batch| {
                    batch_events = batch;
                    std::future::ready(())
                })
                .await;

            let batch_summary = format!(
                "New finding from {}:\n{}\n\nQueued events this cycle: {}",
                finding.agent_id,
                finding.summary,
                batch_events.len()
            );
            let context = format!(
                "Original query: {}\nIteration {}/{}\nSupervisor calls used: {}/{}",
                state.original_query,
                state.iteration + 1,
                state.max_iterations,
                state.supervisor_call_count,
                state.max_supervisor_calls
            );

            let (decision, new_call_count) = run_supervisor(
                llm.clone(),
                store.clone(),
                &batch_summary,
                &context,
                state.max_supervisor_calls,
                state.supervisor_call_count,
            )
            .await?;

            state.supervisor_call_count = new_call_count;
            final_decision = decision;
            if decision == Decision::Replan {
                state.replanning_needed = true;
            }
        }

        for agent_id in store.list_agent_ids().await? {
            if agent_id == "main" || agent_id == "draft_report" || agent_id == "supervisor" {
                continue;
            }
            let file = store.read_agent_file(&agent_id).await?;
            if file.todos.iter().any(|t| {
                t.is_pending() || t.status == dr_store::TodoStatus::InProgress
            }) {
                any_pending_after_cycle = true;
            }
        }

        cycle += 1;
        state.iteration = cycle;

        // A `finish` decided mid-cycle is overridden if work remains, since
        // the supervisor (or a researcher's add_todo call) may have created
        // new work after the decision was made.
        if final_decision == Decision::Finish && any_pending_after_cycle {
            final_decision = Decision::Continue;
        }

        if !any_pending_after_cycle {
            // Liveness: every agent is idle. Force a mandatory finalisation
            // call, bypassing the supervisor call cap.
            let context = format!(
                "Original query: {}\nAll agents report no pending work. Mandatory finalisation.",
                state.original_query
            );
            let (decision, new_call_count) = run_supervisor(
                llm.clone(),
                store.clone(),
                "All agents idle; no pending or in-progress todos remain.",
                &context,
                usize::MAX,
                state.supervisor_call_count,
            )
            .await?;
            state.supervisor_call_count = new_call_count.min(state.max_supervisor_calls);
            final_decision = decision;
            break;
        }

        if final_decision == Decision::Finish || final_decision == Decision::Replan {
            break;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Ok(ExecutionOutcome {
        findings,
        final_decision,
        iterations_run: cycle,
    })
}
