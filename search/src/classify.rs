//! Classifier stage (§4.9): picks a [`SearchMode`] and rewrites the query
//! to a standalone form, via one structured LLM call.

use dr_core::LanguageModel;
use dr_core::llm::{LLMRequest, Message};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::SearchError;
use crate::mode::SearchMode;

#[derive(Debug, Deserialize, JsonSchema)]
struct ClassifierOutput {
    /// One of `chat`, `web`, `deep_search`, `deep_research`.
    mode: String,
    /// The query rewritten to stand alone without the surrounding chat
    /// history (resolves pronouns, folds in prior context).
    rewritten_query: String,
}

/// The classifier's decision: a mode plus a standalone query to search or
/// answer with.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The routed mode.
    pub mode: SearchMode,
    /// The standalone rewritten query.
    pub rewritten_query: String,
}

/// Classifies `query` (with optional chat history for context) into a
/// [`SearchMode`] and a standalone rewritten query.
pub async fn classify<LLM: LanguageModel>(
    llm: &LLM,
    query: &str,
    chat_history: &str,
) -> Result<Classification, SearchError> {
    let system = "You are a query router for a research assistant. Given the \
        latest user message and recent chat history, decide whether it needs \
        web search at all, and if so how much: `chat` for no search, `web` \
        for a quick single search, `deep_search` for a few search rounds, or \
        `deep_research` for exhaustive multi-round research. Rewrite the \
        query into a standalone form that resolves any pronouns or implicit \
        references to the chat history, so it can be searched without that \
        history.";
    let prompt = format!("Chat history:\n{chat_history}\n\nLatest message: {query}");
    let request = LLMRequest::new(vec![Message::system(system), Message::user(prompt)]);

    let output: ClassifierOutput = llm
        .generate(request)
        .await
        .map_err(SearchError::Classifier)?;

    let mode = SearchMode::parse_alias(&output.mode).unwrap_or(SearchMode::Web);
    Ok(Classification {
        mode,
        rewritten_query: if output.rewritten_query.trim().is_empty() {
            query.to_string()
        } else {
            output.rewritten_query
        },
    })
}
