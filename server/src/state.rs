//! Shared application state handed to every route (`axum::Router::with_state`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dr_graph::{CancelToken, Scraper, SearchProvider};
use dr_session::{ChatStore, InMemorySessionStore, SessionManager, SessionStore};
use dr_streaming::StreamingHub;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::llm::{OpenAiChatModel, OpenAiEmbeddingModel};
use crate::scraper::HttpScraper;
use crate::search_backend::{SearxngProvider, TavilyProvider};

/// Everything a request handler or background session run needs.
///
/// Cheap to clone: every field is either `Copy`, an `Arc`, or itself
/// internally `Arc`-backed (the two LLM clients).
#[derive(Clone)]
pub struct AppState {
    pub llm: OpenAiChatModel,
    pub embedder: OpenAiEmbeddingModel,
    pub search: Arc<dyn SearchProvider>,
    pub scraper: Arc<dyn Scraper>,
    pub sessions: Arc<SessionManager>,
    pub chat_store: Arc<dyn ChatStore>,
    pub streaming: Arc<StreamingHub>,
    pub memory_root: PathBuf,
    pub config: AppConfig,
    /// Cancel tokens for in-flight deep-research runs, keyed by session id
    /// (§4.11). Chat/web/deep-search runs have no node-boundary to cancel
    /// at and are left to run to completion.
    pub cancel_tokens: Arc<Mutex<HashMap<String, CancelToken>>>,
}

impl AppState {
    /// Builds the full dependency graph from `config`, picking whichever
    /// search backend §6 configures (SearXNG first, Tavily as a fallback)
    /// and sharing a single in-memory store for both sessions and chat
    /// history, since a single-process deployment has no need to split them.
    ///
    /// # Errors
    /// Returns an error if no search backend is configured, or if the
    /// scraper's HTTP client fails to build.
    pub fn build(config: AppConfig, memory_root: PathBuf) -> anyhow::Result<Self> {
        let search: Arc<dyn SearchProvider> = if let Some(url) = &config.searxng_instance_url {
            Arc::new(SearxngProvider::new(url.clone()))
        } else if let Some(key) = &config.tavily_api_key {
            Arc::new(TavilyProvider::new(key.clone()))
        } else {
            anyhow::bail!("no search backend configured: set SEARXNG_INSTANCE_URL or TAVILY_API_KEY");
        };

        let llm = OpenAiChatModel::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            std::env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        );
        let embedder = OpenAiEmbeddingModel::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            std::env::var("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            std::env::var("OPENAI_EMBEDDING_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1536),
        );

        let store = InMemorySessionStore::new();
        let sessions = Arc::new(SessionManager::new(store.clone() as Arc<dyn SessionStore>));

        Ok(Self {
            llm,
            embedder,
            search,
            scraper: Arc::new(HttpScraper::new()?),
            sessions,
            chat_store: store as Arc<dyn ChatStore>,
            streaming: StreamingHub::new(),
            memory_root,
            config,
            cancel_tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}
