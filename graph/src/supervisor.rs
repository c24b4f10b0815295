//! Supervisor agent (C3): a ReAct agent with memory tools that reviews
//! researcher findings, mutates todos, and writes the draft report.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dr_agent::{Agent, AgentConfig, AgentKind};
use dr_core::LanguageModel;
use dr_store::{AgentFileStore, Priority, Todo};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::GraphError;

/// The supervisor's terminal decision for one review call (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep running the current cycle.
    Continue,
    /// Request a new plan (sets `replanning_needed`).
    Replan,
    /// No further research is needed.
    Finish,
}

impl Decision {
    fn parse(raw: &str) -> Self {
        match raw {
            "replan" => Self::Replan,
            "finish" => Self::Finish,
            _ => Self::Continue,
        }
    }
}

/// Shared call-accounting state across every tool instance in one
/// supervisor invocation (§4.3 "Call accounting").
struct CallBudget {
    count: AtomicUsize,
    max: usize,
}

impl CallBudget {
    /// Charges one todo-mutating call against the budget. Returns `false`
    /// (and does not mutate) once the cap is reached.
    fn try_charge(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Relaxed);
            if current >= self.max {
                return false;
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MaxLenArgs {
    #[serde(default = "default_max_length")]
    max_length: usize,
}

fn default_max_length() -> usize {
    4000
}

struct ReadMainDocumentTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReadMainDocumentTool {
    fn name(&self) -> Cow<'static, str> {
        "read_main_document".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reads the shared main document of cross-agent insights, truncated to max_length.".into()
    }

    type Arguments = MaxLenArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let file = self.store.read_agent_file("main").await?;
        let text = file.character.unwrap_or_default();
        Ok(text.chars().take(args.max_length).collect())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteMainDocumentArgs {
    section_title: String,
    content: String,
}

struct WriteMainDocumentTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for WriteMainDocumentTool {
    fn name(&self) -> Cow<'static, str> {
        "write_main_document".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Appends a section of shared insight to the main document.".into()
    }

    type Arguments = WriteMainDocumentArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut file = self.store.read_agent_file("main").await?;
        let mut doc = file.character.unwrap_or_default();
        doc.push_str(&format!("\n\n## {}\n\n{}", args.section_title, args.content));
        file.character = Some(doc);
        self.store.write_agent_file("main", &file).await?;
        Ok("main document updated".to_string())
    }
}

/// One numbered section of the draft report.
struct Chapter {
    title: String,
    body: String,
}

/// Parses `## Chapter N: Title` headings (and the bare legacy `## Chapter:
/// Title` form) out of the stored draft markdown, in write order.
fn parse_chapters(markdown: &str) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut current: Option<Chapter> = None;
    for line in markdown.lines() {
        if let Some(rest) = line.strip_prefix("## Chapter") {
            let rest = rest.trim();
            let title = match rest.split_once(':') {
                Some((num, title)) if num.trim().chars().all(|c| c.is_ascii_digit()) => {
                    title.trim().to_string()
                }
                _ => rest.trim_start_matches(':').trim().to_string(),
            };
            chapters.extend(current.take());
            current = Some(Chapter {
                title,
                body: String::new(),
            });
            continue;
        }
        if let Some(chapter) = current.as_mut() {
            chapter.body.push_str(line);
            chapter.body.push('\n');
        }
    }
    chapters.extend(current.take());
    chapters
}

/// Invariant I5: chapters are renumbered sequentially from 1 and deduped by
/// `(number, title.lower())` — since renumbering makes the number unique per
/// position, this reduces to keeping the first chapter for each lower-cased
/// title and dropping later ones with the same title.
fn dedupe_chapters(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut seen = std::collections::HashSet::new();
    chapters
        .into_iter()
        .filter(|chapter| seen.insert(chapter.title.to_lowercase()))
        .collect()
}

fn render_chapters(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    for (i, chapter) in chapters.iter().enumerate() {
        out.push_str(&format!(
            "\n\n## Chapter {}: {}\n\n{}",
            i + 1,
            chapter.title,
            chapter.body.trim()
        ));
    }
    out.trim_start().to_string()
}

/// Renumbers and dedupes chapters in stored draft markdown (Invariant I5).
/// Every consumer of the draft report — `read_draft_report` and
/// `generate_report`'s length-floor fallback — goes through this so a
/// repeated read always yields the same contiguous, title-deduped sequence.
pub(crate) fn normalize_draft_report(markdown: &str) -> String {
    render_chapters(&dedupe_chapters(parse_chapters(markdown)))
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadDraftReportArgs {}

struct ReadDraftReportTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReadDraftReportTool {
    fn name(&self) -> Cow<'static, str> {
        "read_draft_report".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reads the current chapter-structured draft report.".into()
    }

    type Arguments = ReadDraftReportArgs;

    async fn call(&mut self, _args: Self::Arguments) -> dr_core::Result {
        let file = self.store.read_agent_file("draft_report").await?;
        Ok(normalize_draft_report(&file.preferences.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteDraftReportArgs {
    section_title: String,
    content: String,
    /// `"append"` or `"replace_chapter"`.
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "append".to_string()
}

struct WriteDraftReportTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for WriteDraftReportTool {
    fn name(&self) -> Cow<'static, str> {
        "write_draft_report".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Writes or replaces a chapter of the draft report (always allowed, uncapped).".into()
    }

    type Arguments = WriteDraftReportArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut file = self.store.read_agent_file("draft_report").await?;
        let mut chapters = parse_chapters(&file.preferences.unwrap_or_default());

        let existing = if args.mode == "replace_chapter" {
            chapters
                .iter_mut()
                .find(|c| c.title.eq_ignore_ascii_case(&args.section_title))
        } else {
            None
        };
        match existing {
            Some(chapter) => chapter.body = args.content,
            None => chapters.push(Chapter {
                title: args.section_title,
                body: args.content,
            }),
        }

        file.preferences = Some(render_chapters(&dedupe_chapters(chapters)));
        self.store.write_agent_file("draft_report", &file).await?;
        Ok("draft report updated".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadSupervisorFileArgs {}

struct ReadSupervisorFileTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReadSupervisorFileTool {
    fn name(&self) -> Cow<'static, str> {
        "read_supervisor_file".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reads the supervisor's own private notebook.".into()
    }

    type Arguments = ReadSupervisorFileArgs;

    async fn call(&mut self, _args: Self::Arguments) -> dr_core::Result {
        let file = self.store.read_agent_file("supervisor").await?;
        Ok(dr_core::llm::tool::json(&file.notes))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteSupervisorNoteArgs {
    content: String,
}

struct WriteSupervisorNoteTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for WriteSupervisorNoteTool {
    fn name(&self) -> Cow<'static, str> {
        "write_supervisor_note".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Appends a note to the supervisor's private notebook.".into()
    }

    type Arguments = WriteSupervisorNoteArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut file = self.store.read_agent_file("supervisor").await?;
        file.notes.push(dr_store::AgentNote {
            title: "note".to_string(),
            summary: args.content,
            urls: vec![],
            tags: vec![],
            shared: false,
        });
        self.store.write_agent_file("supervisor", &file).await?;
        Ok("supervisor note saved".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReviewAgentProgressArgs {
    agent_id: String,
}

struct ReviewAgentProgressTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReviewAgentProgressTool {
    fn name(&self) -> Cow<'static, str> {
        "review_agent_progress".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reports percent done, status counts, and a todo summary for one agent.".into()
    }

    type Arguments = ReviewAgentProgressArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let file = self.store.read_agent_file(&args.agent_id).await?;
        let total = file.todos.len();
        let done = file
            .todos
            .iter()
            .filter(|t| t.status == dr_store::TodoStatus::Done)
            .count();
        let percent = if total == 0 { 100 } else { (done * 100) / total };
        Ok(dr_core::llm::tool::json(&serde_json::json!({
            "agent_id": args.agent_id,
            "percent_done": percent,
            "total": total,
            "done": done,
            "todos": file.todos,
        })))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateAgentTodoArgs {
    agent_id: String,
    reasoning: String,
    title: String,
    objective: String,
    expected_output: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    guidance: Option<String>,
}

struct CreateAgentTodoTool {
    store: Arc<AgentFileStore>,
    budget: Arc<CallBudget>,
}

impl dr_core::llm::Tool for CreateAgentTodoTool {
    fn name(&self) -> Cow<'static, str> {
        "create_agent_todo".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Appends a new todo to an agent's list. Subject to the supervisor call cap.".into()
    }

    type Arguments = CreateAgentTodoArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        if !self.budget.try_charge() {
            return Ok("supervisor call cap reached; create_agent_todo was not applied".to_string());
        }
        let priority = match args.priority.as_deref() {
            Some("low") => Priority::Low,
            Some("high") => Priority::High,
            Some("critical") => Priority::Critical,
            _ => Priority::Medium,
        };
        let mut file = self.store.read_agent_file(&args.agent_id).await?;

        // Invariant I3: reject or auto-qualify duplicate titles.
        let title = if file.todos.iter().any(|t| t.title.eq_ignore_ascii_case(&args.title)) {
            format!("{}: {}", args.agent_id, args.title)
        } else {
            args.title
        };

        let mut todo = Todo::new(args.reasoning, title, args.objective, args.expected_output, priority);
        if let Some(guidance) = args.guidance {
            todo.note = Some(guidance);
        }
        file.todos.push(todo);
        self.store.write_agent_file(&args.agent_id, &file).await?;
        Ok("todo created".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateAgentTodoArgs {
    agent_id: String,
    title: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    sources_needed: Option<Vec<String>>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

struct UpdateAgentTodoTool {
    store: Arc<AgentFileStore>,
    budget: Arc<CallBudget>,
}

impl dr_core::llm::Tool for UpdateAgentTodoTool {
    fn name(&self) -> Cow<'static, str> {
        "update_agent_todo".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Mutates fields of an existing todo, matched by title. Subject to the supervisor call cap.".into()
    }

    type Arguments = UpdateAgentTodoArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        if !self.budget.try_charge() {
            return Ok("supervisor call cap reached; update_agent_todo was not applied".to_string());
        }
        self.store
            .update_agent_todo(&args.agent_id, &args.title, |todo| {
                if let Some(status) = &args.status {
                    todo.status = match status.as_str() {
                        "done" => dr_store::TodoStatus::Done,
                        "in_progress" => dr_store::TodoStatus::InProgress,
                        _ => dr_store::TodoStatus::Pending,
                    };
                }
                if args.note.is_some() {
                    todo.note = args.note;
                }
                if let Some(objective) = args.objective {
                    todo.objective = objective;
                }
                if let Some(expected_output) = args.expected_output {
                    todo.expected_output = expected_output;
                }
                if let Some(sources_needed) = args.sources_needed {
                    todo.sources_needed = sources_needed;
                }
                if let Some(priority) = &args.priority {
                    todo.priority = match priority.as_str() {
                        "low" => Priority::Low,
                        "high" => Priority::High,
                        "critical" => Priority::Critical,
                        _ => Priority::Medium,
                    };
                }
                if args.url.is_some() {
                    todo.url = args.url;
                }
            })
            .await?;
        Ok("todo updated".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MakeFinalDecisionArgs {
    reasoning: String,
    /// `"continue"`, `"replan"`, or `"finish"`.
    decision: String,
}

struct MakeFinalDecisionTool {
    decision: Arc<Mutex<Option<Decision>>>,
}

impl dr_core::llm::Tool for MakeFinalDecisionTool {
    fn name(&self) -> Cow<'static, str> {
        "make_final_decision".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Terminal tool: records continue/replan/finish for this review call.".into()
    }

    type Arguments = MakeFinalDecisionArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        tracing::info!(reasoning = %args.reasoning, decision = %args.decision, "supervisor decision");
        *self.decision.lock().expect("poisoned") = Some(Decision::parse(&args.decision));
        Ok(format!("decision recorded: {}", args.decision))
    }
}

/// Runs one supervisor review call over a batch summary of new findings
/// (§4.3). Returns the terminal decision. An empty tool-calls set (the
/// agent stopping without ever calling `make_final_decision`) is an
/// implicit `make_final_decision("finish")` per the never-empty-tool-calls
/// rule, so the default here is `Finish`, not `Continue`.
pub async fn run_supervisor<LLM: LanguageModel + Clone>(
    llm: LLM,
    store: Arc<AgentFileStore>,
    batch_summary: &str,
    context: &str,
    max_supervisor_calls: usize,
    current_call_count: usize,
) -> Result<(Decision, usize), GraphError> {
    let decision = Arc::new(Mutex::new(None));
    let budget = Arc::new(CallBudget {
        count: AtomicUsize::new(current_call_count),
        max: max_supervisor_calls,
    });

    let system_prompt = format!(
        "You are the research supervisor. Review new findings, decide whether to \
         continue, replan, or finish, and write chapters (not raw dumps) to the \
         draft report. Match the user's language. Stay on the original query. \
         Diversify agents over distinct angles. Prefer update_agent_todo over \
         re-creating todos. Always call at least one tool.\n\n{context}"
    );

    let mut agent = Agent::builder(llm)
        .config(AgentConfig {
            agent_kind: AgentKind::Supervisor,
            max_iterations: 6,
            ..AgentConfig::default()
        })
        .system_prompt(system_prompt)
        .tool(ReadMainDocumentTool { store: store.clone() })
        .tool(WriteMainDocumentTool { store: store.clone() })
        .tool(ReadDraftReportTool { store: store.clone() })
        .tool(WriteDraftReportTool { store: store.clone() })
        .tool(ReadSupervisorFileTool { store: store.clone() })
        .tool(WriteSupervisorNoteTool { store: store.clone() })
        .tool(ReviewAgentProgressTool { store: store.clone() })
        .tool(CreateAgentTodoTool {
            store: store.clone(),
            budget: budget.clone(),
        })
        .tool(UpdateAgentTodoTool {
            store: store.clone(),
            budget: budget.clone(),
        })
        .tool(MakeFinalDecisionTool {
            decision: decision.clone(),
        })
        .build();

    let outcome = agent.query(batch_summary).await;
    if let Err(err) = outcome {
        tracing::warn!(error = %err, "supervisor review degraded");
    }

    let final_decision = decision.lock().expect("poisoned").unwrap_or(Decision::Finish);
    let new_count = budget.count.load(Ordering::Relaxed);
    Ok((final_decision, new_count))
}
