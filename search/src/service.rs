//! Ties classification, the research agent, reranking, and the writer
//! into the two-stage search service (§4.9), and exposes it to the
//! research graph as a [`DeepSearchService`].

use std::sync::Arc;

use dr_agent::{Agent, AgentConfig};
use dr_core::{EmbeddingModel, LanguageModel};
use dr_graph::{DeepSearchService, Scraper, SearchHit, SearchProvider};

use crate::agent::run_research_agent;
use crate::classify::classify;
use crate::error::SearchError;
use crate::mode::SearchMode;
use crate::rerank::{dedupe, filter_blocked, rerank, DEFAULT_PER_DOMAIN_LIMIT};
use crate::writer::write_answer;

/// Domain/keyword blocklists (`SEARCH_BLOCKED_DOMAINS`/`SEARCH_BLOCKED_KEYWORDS`, §6).
#[derive(Debug, Clone, Default)]
pub struct Blocklists {
    /// Domains to drop, matched exactly or as a subdomain.
    pub domains: Vec<String>,
    /// Lowercased keywords; a result whose title+snippet contains one is dropped.
    pub keywords: Vec<String>,
}

/// What one search-service run produced.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The mode the classifier routed to (or the caller's override).
    pub mode: SearchMode,
    /// The standalone rewritten query.
    pub rewritten_query: String,
    /// The final cited markdown answer.
    pub answer: String,
    /// The sources actually used, after dedup/blocklist/rerank.
    pub sources: Vec<SearchHit>,
}

/// The two-stage search service: classify, run a mode-tuned research
/// agent, rerank, then write a cited answer.
pub struct SearchService<LLM, E> {
    llm: LLM,
    embedder: E,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    blocklists: Blocklists,
}

impl<LLM, E> SearchService<LLM, E>
where
    LLM: LanguageModel + Clone + Send + Sync,
    E: EmbeddingModel + Send + Sync,
{
    /// Builds a service over a shared LLM, embedder, search provider and
    /// scraper.
    pub fn new(llm: LLM, embedder: E, search: Arc<dyn SearchProvider>, scraper: Arc<dyn Scraper>, blocklists: Blocklists) -> Self {
        Self {
            llm,
            embedder,
            search,
            scraper,
            blocklists,
        }
    }

    /// Runs the full two-stage pipeline. `chat_history` is a formatted
    /// transcript used only for classification/query rewriting context.
    /// `mode_override` skips the classifier when the caller already knows
    /// the mode (e.g. a transport-level mode alias from §6).
    pub async fn run(&self, query: &str, chat_history: &str, mode_override: Option<SearchMode>) -> Result<SearchOutcome, SearchError> {
        let (mode, rewritten_query) = match mode_override {
            Some(mode) => (mode, query.to_string()),
            None => {
                let classification = classify(&self.llm, query, chat_history).await?;
                (classification.mode, classification.rewritten_query)
            }
        };

        if mode == SearchMode::Chat {
            let answer = self.answer_without_search(&rewritten_query).await?;
            return Ok(SearchOutcome {
                mode,
                rewritten_query,
                answer,
                sources: Vec::new(),
            });
        }

        let tuning = mode.tuning();
        let material = run_research_agent(
            self.llm.clone(),
            &rewritten_query,
            tuning,
            self.search.clone(),
            self.scraper.clone(),
        )
        .await?;

        let sources = dedupe(material.sources, DEFAULT_PER_DOMAIN_LIMIT);
        let sources = filter_blocked(sources, &self.blocklists.domains, &self.blocklists.keywords);
        let sources = rerank(&self.embedder, &rewritten_query, sources, tuning.rerank_top_k).await;

        let answer = write_answer(&self.llm, &rewritten_query, &material.notes, &sources, &material.scraped).await?;

        Ok(SearchOutcome {
            mode,
            rewritten_query,
            answer,
            sources,
        })
    }

    async fn answer_without_search(&self, query: &str) -> Result<String, SearchError> {
        let mut agent = Agent::builder(self.llm.clone())
            .config(AgentConfig {
                max_iterations: 1,
                system_prompt: Some("Answer the user's message directly; no search is needed.".to_string()),
                ..AgentConfig::default()
            })
            .build();
        agent.query(query).await.map_err(|err| SearchError::Agent(err.to_string()))
    }
}

#[async_trait::async_trait]
impl<LLM, E> DeepSearchService for SearchService<LLM, E>
where
    LLM: LanguageModel + Clone + Send + Sync,
    E: EmbeddingModel + Send + Sync,
{
    async fn run_compact(&self, query: &str) -> anyhow::Result<String> {
        let outcome = self.run(query, "", Some(SearchMode::Web)).await?;
        Ok(outcome.answer)
    }
}
