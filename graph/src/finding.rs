//! `Finding` (§3): the artifact one researcher produces per completed todo.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How confident the researcher is in a finding, based on how much
/// source material it managed to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No sources, or the todo could not be completed.
    Low,
    /// At least one source was collected.
    Medium,
    /// Multiple corroborating sources.
    High,
}

/// A single source backing a finding.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    /// Source URL.
    pub url: String,
    /// Page title, if known.
    pub title: String,
    /// Short excerpt motivating its inclusion.
    pub snippet: String,
    /// Optional reranking score (cosine similarity to the query).
    pub relevance_score: Option<f32>,
}

/// One researcher's output for one completed todo.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    /// The agent that produced this finding.
    pub agent_id: String,
    /// The todo's topic/title.
    pub topic: String,
    /// Synthesised summary of what was learned.
    pub summary: String,
    /// Bullet-point key findings.
    pub key_findings: Vec<String>,
    /// Distinct sources collected while researching the todo.
    pub sources: Vec<Source>,
    /// How reliable this finding is, given the available sources.
    pub confidence: Confidence,
}

impl Finding {
    /// Derives confidence from the number of distinct sources collected,
    /// per §4.2 step 4: `medium` with at least one source, else `low`.
    /// `high` is reserved for callers that can assert corroboration.
    #[must_use]
    pub fn confidence_from_source_count(count: usize) -> Confidence {
        if count >= 1 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}
