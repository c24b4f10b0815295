//! Researcher worker (C2): a fixed-tool-set ReAct agent that completes at
//! most one todo per invocation.

use std::borrow::Cow;
use std::sync::Arc;

use dr_agent::{Agent, AgentKind};
use dr_core::LanguageModel;
use dr_store::{AgentFileStore, AgentNote, Priority, SupervisorEvent, SupervisorQueue, Todo};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::GraphError;
use crate::finding::{Confidence, Finding, Source};
use crate::provider::{ScrapedPage, Scraper, SearchProvider};
use crate::state::now_ms;

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchArgs {
    /// Search queries to run.
    queries: Vec<String>,
    /// Max results per query.
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    5
}

struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    collected: Arc<std::sync::Mutex<Vec<Source>>>,
}

impl dr_core::llm::Tool for WebSearchTool {
    fn name(&self) -> Cow<'static, str> {
        "web_search".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Searches the web for one or more queries and returns titled, snippeted results.".into()
    }

    type Arguments = WebSearchArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut all = Vec::new();
        for query in &args.queries {
            match self.provider.search(query, args.max_results).await {
                Ok(hits) => {
                    let mut collected = self.collected.lock().expect("poisoned");
                    for hit in &hits {
                        collected.push(Source {
                            url: hit.url.clone(),
                            title: hit.title.clone(),
                            snippet: hit.snippet.clone(),
                            relevance_score: hit.score,
                        });
                    }
                    all.push(serde_json::json!({ "query": query, "results": hits }));
                }
                Err(err) => {
                    tracing::warn!(query, error = %err, "web_search degraded");
                    all.push(serde_json::json!({ "query": query, "error": err.to_string() }));
                }
            }
        }
        Ok(dr_core::llm::tool::json(&all))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ScrapeUrlsArgs {
    /// URLs to fetch and extract.
    urls: Vec<String>,
}

struct ScrapeUrlsTool {
    scraper: Arc<dyn Scraper>,
}

impl dr_core::llm::Tool for ScrapeUrlsTool {
    fn name(&self) -> Cow<'static, str> {
        "scrape_urls".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Fetches one or more URLs and extracts their plain-text content and outbound links.".into()
    }

    type Arguments = ScrapeUrlsArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut pages: Vec<ScrapedPage> = Vec::new();
        for url in &args.urls {
            match self.scraper.scrape(url).await {
                Ok(page) => pages.push(page),
                Err(err) => {
                    tracing::warn!(url, error = %err, "scrape_urls degraded this source");
                }
            }
        }
        Ok(dr_core::llm::tool::json(&pages))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteNoteArgs {
    title: String,
    summary: String,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    share: bool,
}

struct WriteNoteTool {
    store: Arc<AgentFileStore>,
    agent_id: String,
}

impl dr_core::llm::Tool for WriteNoteTool {
    fn name(&self) -> Cow<'static, str> {
        "write_note".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Saves a note to this agent's file, optionally shared with sibling researchers.".into()
    }

    type Arguments = WriteNoteArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut file = self.store.read_agent_file(&self.agent_id).await?;
        file.notes.push(AgentNote {
            title: args.title,
            summary: args.summary,
            urls: args.urls,
            tags: args.tags,
            shared: args.share,
        });
        self.store.write_agent_file(&self.agent_id, &file).await?;
        Ok("note saved".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddTodoItem {
    reasoning: String,
    title: String,
    objective: String,
    expected_output: String,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddTodoArgs {
    items: Vec<AddTodoItem>,
}

struct AddTodoTool {
    store: Arc<AgentFileStore>,
    agent_id: String,
}

impl dr_core::llm::Tool for AddTodoTool {
    fn name(&self) -> Cow<'static, str> {
        "add_todo".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Appends new todo items to this agent's own list.".into()
    }

    type Arguments = AddTodoArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut file = self.store.read_agent_file(&self.agent_id).await?;
        for item in args.items {
            let priority = match item.priority.as_deref() {
                Some("low") => Priority::Low,
                Some("high") => Priority::High,
                Some("critical") => Priority::Critical,
                _ => Priority::Medium,
            };
            if file.todos.iter().any(|t| t.title.eq_ignore_ascii_case(&item.title)) {
                continue;
            }
            file.todos.push(Todo::new(
                item.reasoning,
                item.title,
                item.objective,
                item.expected_output,
                priority,
            ));
        }
        self.store.write_agent_file(&self.agent_id, &file).await?;
        Ok("todos added".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CompleteTodoArgs {
    titles: Vec<String>,
    #[serde(default)]
    note: Option<String>,
}

struct CompleteTodoTool {
    store: Arc<AgentFileStore>,
    agent_id: String,
}

impl dr_core::llm::Tool for CompleteTodoTool {
    fn name(&self) -> Cow<'static, str> {
        "complete_todo".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Marks one or more of this agent's todos as done.".into()
    }

    type Arguments = CompleteTodoArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        for title in &args.titles {
            self.store
                .update_agent_todo(&self.agent_id, title, |todo| {
                    todo.status = dr_store::TodoStatus::Done;
                    todo.note.clone_from(&args.note);
                })
                .await?;
        }
        Ok("todos completed".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadSharedNotesArgs {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

struct ReadSharedNotesTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReadSharedNotesTool {
    fn name(&self) -> Cow<'static, str> {
        "read_shared_notes".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reads notes other researchers have marked as shared.".into()
    }

    type Arguments = ReadSharedNotesArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        let mut matches = Vec::new();
        for agent_id in self.store.list_agent_ids().await? {
            let file = self.store.read_agent_file(&agent_id).await?;
            for note in file.notes.into_iter().filter(|n| n.shared) {
                if let Some(keyword) = &args.keyword {
                    let haystack = format!("{} {}", note.title, note.summary).to_lowercase();
                    if !haystack.contains(&keyword.to_lowercase()) {
                        continue;
                    }
                }
                matches.push(note);
                if matches.len() >= args.limit {
                    return Ok(dr_core::llm::tool::json(&matches));
                }
            }
        }
        Ok(dr_core::llm::tool::json(&matches))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadMainArgs {}

struct ReadMainTool {
    store: Arc<AgentFileStore>,
}

impl dr_core::llm::Tool for ReadMainTool {
    fn name(&self) -> Cow<'static, str> {
        "read_main".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Reads the shared main document the supervisor maintains (read-only).".into()
    }

    type Arguments = ReadMainArgs;

    async fn call(&mut self, _args: Self::Arguments) -> dr_core::Result {
        let file = self.store.read_agent_file("main").await?;
        Ok(file.character.unwrap_or_default())
    }
}

/// Runs one researcher worker to completion (§4.2): picks its
/// highest-priority pending todo, drives the ReAct loop, synthesises a
/// [`Finding`], marks the todo done, and enqueues the completion for
/// supervisor review.
pub async fn run_researcher<LLM: LanguageModel + Clone>(
    llm: LLM,
    agent_id: &str,
    store: Arc<AgentFileStore>,
    queue: Arc<SupervisorQueue>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    max_steps: usize,
) -> Result<Finding, GraphError> {
    let file = store.read_agent_file(agent_id).await?;
    let Some(idx) = dr_store::pick_next_pending(&file.todos) else {
        let finding = Finding {
            agent_id: agent_id.to_string(),
            topic: "no pending tasks".to_string(),
            summary: String::new(),
            key_findings: vec![],
            sources: vec![],
            confidence: Confidence::Low,
        };
        queue
            .enqueue(SupervisorEvent {
                agent_id: agent_id.to_string(),
                action: "no_tasks".to_string(),
                result: serde_json::json!({}),
                timestamp_ms: now_ms(),
            })
            .await;
        return Ok(finding);
    };
    let todo = file.todos[idx].clone();

    store
        .update_agent_todo(agent_id, &todo.title, |t| {
            t.status = dr_store::TodoStatus::InProgress;
        })
        .await?;

    let collected: Arc<std::sync::Mutex<Vec<Source>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

    let system_prompt = format!(
        "You are a research specialist. Complete the following task self-contained, \
         using only the information given here; you do not have access to the \
         original user query or chat history.\n\n\
         Title: {}\nObjective: {}\nExpected output: {}\nSources needed: {:?}\n\n\
         Call `finish` when you have gathered enough to answer.",
        todo.title, todo.objective, todo.expected_output, todo.sources_needed
    );

    let mut agent = Agent::builder(llm)
        .config(dr_agent::AgentConfig {
            agent_kind: AgentKind::Researcher,
            max_iterations: max_steps,
            ..dr_agent::AgentConfig::default()
        })
        .system_prompt(system_prompt)
        .tool(WebSearchTool {
            provider: search,
            collected: collected.clone(),
        })
        .tool(ScrapeUrlsTool { scraper })
        .tool(WriteNoteTool {
            store: store.clone(),
            agent_id: agent_id.to_string(),
        })
        .tool(AddTodoTool {
            store: store.clone(),
            agent_id: agent_id.to_string(),
        })
        .tool(CompleteTodoTool {
            store: store.clone(),
            agent_id: agent_id.to_string(),
        })
        .tool(ReadSharedNotesTool {
            store: store.clone(),
        })
        .tool(ReadMainTool {
            store: store.clone(),
        })
        .build();

    let result = agent
        .query(&format!("Complete the task: {}", todo.title))
        .await;

    if let Err(err) = &result {
        tracing::warn!(agent_id, error = %err, "researcher ReAct loop degraded");
    }

    // Synthesise the finding from this agent's last N notes (§4.2 step 4),
    // not from the ReAct loop's raw final response text.
    const NOTE_WINDOW: usize = 5;
    const SUMMARY_CHAR_LIMIT: usize = 1200;

    let file_after = store.read_agent_file(agent_id).await?;
    let skip = file_after.notes.len().saturating_sub(NOTE_WINDOW);
    let recent_notes: Vec<&AgentNote> = file_after.notes.iter().skip(skip).collect();

    let (summary, key_findings) = if recent_notes.is_empty() {
        match &result {
            Ok(text) => (text.clone(), vec![]),
            Err(err) => (format!("Unable to complete task: {err}"), vec![]),
        }
    } else {
        let joined: String = recent_notes
            .iter()
            .map(|n| n.summary.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let summary: String = joined.chars().take(SUMMARY_CHAR_LIMIT).collect();
        let key_findings = recent_notes.iter().map(|n| n.title.clone()).collect();
        (summary, key_findings)
    };

    let sources = {
        let guard = collected.lock().expect("poisoned");
        let mut seen = std::collections::HashSet::new();
        guard
            .iter()
            .filter(|s| seen.insert(s.url.clone()))
            .take(20)
            .cloned()
            .collect::<Vec<_>>()
    };

    let finding = Finding {
        agent_id: agent_id.to_string(),
        topic: todo.title.clone(),
        summary,
        confidence: Finding::confidence_from_source_count(sources.len()),
        key_findings,
        sources,
    };

    store
        .update_agent_todo(agent_id, &todo.title, |t| {
            t.status = dr_store::TodoStatus::Done;
            t.note = Some("completed by researcher".to_string());
        })
        .await?;

    queue
        .enqueue(SupervisorEvent {
            agent_id: agent_id.to_string(),
            action: "task_completed".to_string(),
            result: serde_json::to_value(&finding).unwrap_or_default(),
            timestamp_ms: now_ms(),
        })
        .await;

    Ok(finding)
}
