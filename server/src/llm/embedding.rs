//! `EmbeddingModel` backed by any OpenAI-compatible `/embeddings` endpoint.
//!
//! No concrete `EmbeddingModel` exists anywhere upstream; this mirrors the
//! request/response shape of [`super::openai`]'s chat client.

use std::sync::Arc;

use dr_core::embedding::EmbeddingModel;
use serde::Deserialize;
use serde_json::json;

use super::error::OpenAiError;

#[derive(Debug, Clone)]
struct Config {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

/// An embeddings endpoint reachable over HTTP, configured the same way as
/// [`super::openai::OpenAiChatModel`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingModel {
    inner: Arc<Config>,
}

impl OpenAiEmbeddingModel {
    /// `dimensions` must match what `model` actually returns; OpenAI does
    /// not report it in the response for every model generation.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Config {
                http: reqwest::Client::new(),
                base_url: base_url.into(),
                api_key,
                model: model.into(),
                dimensions,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl EmbeddingModel for OpenAiEmbeddingModel {
    fn dim(&self) -> usize {
        self.inner.dimensions
    }

    async fn embed(&self, text: &str) -> dr_core::Result<Vec<f32>> {
        let config = &self.inner;
        let url = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
        let body = json!({ "model": config.model, "input": text });

        let mut request = config.http.post(url).json(&body);
        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response: EmbeddingsResponse = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(OpenAiError::from)?
            .json()
            .await
            .map_err(OpenAiError::from)?;

        response
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| anyhow::anyhow!("embeddings response contained no data"))
    }
}
