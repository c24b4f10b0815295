//! External collaborators the graph consumes only through narrow
//! interfaces (§1 "Deliberately out of scope", §6): the search provider
//! and the page scraper.

use serde::{Deserialize, Serialize};

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Search-engine snippet.
    pub snippet: String,
    /// Provider relevance score, if available.
    pub score: Option<f32>,
    /// Publication date, if known.
    pub published_date: Option<String>,
}

/// `search(query, max_results) -> {results, total_results}` (§6).
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs a single search query.
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// A scraped page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// The URL that was scraped.
    pub url: String,
    /// Page title, if extracted.
    pub title: Option<String>,
    /// Plain-text content.
    pub content: String,
    /// Outbound links found on the page.
    pub links: Vec<String>,
}

/// `scrape(url) -> {title, text, links}` (§6). Timeouts surface as an
/// error; callers degrade that source rather than failing the worker.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    /// Fetches and extracts a single page.
    async fn scrape(&self, url: &str) -> anyhow::Result<ScrapedPage>;
}

/// The `run_deep_search` node's view of C9, run in its compact mode.
#[async_trait::async_trait]
pub trait DeepSearchService: Send + Sync {
    /// Runs a compact search-and-summarize pass over `query`, returning
    /// markdown suitable for display ahead of clarification questions.
    async fn run_compact(&self, query: &str) -> anyhow::Result<String>;
}
