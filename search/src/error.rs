use thiserror::Error;

/// Errors surfaced by the two-stage search service.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The classifier's structured-output call failed.
    #[error("classifier error: {0}")]
    Classifier(#[source] anyhow::Error),

    /// The research agent's ReAct loop failed.
    #[error("research agent error: {0}")]
    Agent(String),

    /// The writer's synthesis call failed.
    #[error("writer error: {0}")]
    Writer(#[source] anyhow::Error),

    /// The configured search provider failed.
    #[error("search provider error: {0}")]
    Provider(#[source] anyhow::Error),
}
