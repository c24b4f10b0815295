//! Research agent stage (§4.9): a mode-tuned ReAct loop over
//! `web_search`, `scrape_url`, `__reasoning_preamble`, and `done`.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use dr_agent::{Agent, AgentConfig, AgentKind};
use dr_core::LanguageModel;
use dr_graph::{ScrapedPage, Scraper, SearchHit, SearchProvider};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::SearchError;
use crate::mode::ModeTuning;

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchArgs {
    /// Search query.
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    8
}

struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    collected: Arc<Mutex<Vec<SearchHit>>>,
}

impl dr_core::llm::Tool for WebSearchTool {
    fn name(&self) -> Cow<'static, str> {
        "web_search".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Searches the web for a single query and returns titled, snippeted results.".into()
    }

    type Arguments = WebSearchArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        match self.provider.search(&args.query, args.max_results).await {
            Ok(hits) => {
                self.collected.lock().expect("poisoned").extend(hits.iter().cloned());
                Ok(dr_core::llm::tool::json(&hits))
            }
            Err(err) => {
                tracing::warn!(query = %args.query, error = %err, "web_search degraded");
                Ok(dr_core::llm::tool::json(&serde_json::json!({ "error": err.to_string() })))
            }
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ScrapeUrlArgs {
    url: String,
}

struct ScrapeUrlTool {
    scraper: Arc<dyn Scraper>,
    collected: Arc<Mutex<Vec<ScrapedPage>>>,
}

impl dr_core::llm::Tool for ScrapeUrlTool {
    fn name(&self) -> Cow<'static, str> {
        "scrape_url".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Fetches a single URL and extracts its plain-text content and outbound links.".into()
    }

    type Arguments = ScrapeUrlArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        match self.scraper.scrape(&args.url).await {
            Ok(page) => {
                self.collected.lock().expect("poisoned").push(page.clone());
                Ok(dr_core::llm::tool::json(&page))
            }
            Err(err) => {
                tracing::warn!(url = %args.url, error = %err, "scrape_url degraded this source");
                Ok(dr_core::llm::tool::json(&serde_json::json!({ "error": err.to_string() })))
            }
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReasoningPreambleArgs {
    /// The agent's plan before it starts calling search/scrape tools.
    reasoning: String,
}

struct ReasoningPreambleTool;

impl dr_core::llm::Tool for ReasoningPreambleTool {
    fn name(&self) -> Cow<'static, str> {
        "__reasoning_preamble".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Records the agent's research plan before its first search. Call this first.".into()
    }

    type Arguments = ReasoningPreambleArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        tracing::debug!(reasoning = %args.reasoning, "research agent reasoning preamble");
        Ok("noted".to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DoneArgs {
    /// Why the agent believes it has gathered enough to answer.
    summary: String,
}

struct DoneTool;

impl dr_core::llm::Tool for DoneTool {
    fn name(&self) -> Cow<'static, str> {
        "done".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Signals that enough sources have been gathered; call this, then answer in text.".into()
    }

    type Arguments = DoneArgs;

    async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
        Ok(args.summary)
    }
}

/// What the research agent stage collected for the writer.
pub struct AgentMaterial {
    /// The agent's final narrative text (its last response).
    pub notes: String,
    /// Every search hit seen across all tool calls.
    pub sources: Vec<SearchHit>,
    /// Every page scraped.
    pub scraped: Vec<ScrapedPage>,
}

/// Runs the mode-tuned research agent over `query`, returning the material
/// the writer stage needs to synthesize a cited answer.
pub async fn run_research_agent<LLM: LanguageModel>(
    llm: LLM,
    query: &str,
    tuning: ModeTuning,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
) -> Result<AgentMaterial, SearchError> {
    let sources: Arc<Mutex<Vec<SearchHit>>> = Arc::new(Mutex::new(Vec::new()));
    let scraped: Arc<Mutex<Vec<ScrapedPage>>> = Arc::new(Mutex::new(Vec::new()));

    let system_prompt = if tuning.mandatory_reasoning_preamble {
        "You are a web research agent. Before your first search, call \
         `__reasoning_preamble` with your plan. Then use `web_search` and \
         `scrape_url` to gather sources, call `done` once you have enough, \
         and finish with a plain-text synthesis of what you found."
            .to_string()
    } else {
        "You are a web research agent. Use `web_search` and `scrape_url` to \
         gather sources, call `done` once you have enough, and finish with a \
         plain-text synthesis of what you found."
            .to_string()
    };

    let mut agent = Agent::builder(llm)
        .config(AgentConfig {
            agent_kind: AgentKind::Researcher,
            max_iterations: tuning.agent_max_steps.max(1),
            ..AgentConfig::default()
        })
        .system_prompt(system_prompt)
        .tool(WebSearchTool {
            provider: search,
            collected: sources.clone(),
        })
        .tool(ScrapeUrlTool {
            scraper,
            collected: scraped.clone(),
        })
        .tool(ReasoningPreambleTool)
        .tool(DoneTool)
        .build();

    let notes = agent
        .query(query)
        .await
        .map_err(|err| SearchError::Agent(err.to_string()))?;

    Ok(AgentMaterial {
        notes,
        sources: sources.lock().expect("poisoned").clone(),
        scraped: scraped.lock().expect("poisoned").clone(),
    })
}
