//! `SearchProvider` backed by a SearXNG instance's JSON API.

use async_trait::async_trait;
use dr_graph::{SearchHit, SearchProvider};
use serde::Deserialize;

/// Queries a self-hosted or public SearXNG instance, selected via
/// `SEARXNG_INSTANCE_URL` (§6).
#[derive(Debug, Clone)]
pub struct SearxngProvider {
    client: reqwest::Client,
    instance_url: String,
}

impl SearxngProvider {
    #[must_use]
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            instance_url: instance_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.instance_url.trim_end_matches('/'));
        let response: SearxngResponse = self
            .client
            .get(url)
            .query(&[("q", query), ("format", "json")])
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
