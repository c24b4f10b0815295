//! `SearchProvider` backed by the Tavily search API.

use async_trait::async_trait;
use dr_graph::{SearchHit, SearchProvider};
use serde::Deserialize;
use serde_json::json;

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Queries Tavily, selected via `TAVILY_API_KEY` (§6).
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilyProvider {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default, rename = "published_date")]
    published_date: Option<String>,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let response: TavilyResponse = self
            .client
            .post(TAVILY_URL)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .results
            .into_iter()
            .take(max_results)
            .map(|result| SearchHit {
                title: result.title,
                url: result.url,
                snippet: result.content,
                score: result.score,
                published_date: result.published_date,
            })
            .collect())
    }
}
