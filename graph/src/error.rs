use thiserror::Error;

/// Errors surfaced by the research graph and its nodes.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The underlying ReAct agent failed.
    #[error("agent error: {0}")]
    Agent(String),

    /// A structured-output LLM call failed to parse or validate.
    #[error("structured output error: {0}")]
    StructuredOutput(#[source] anyhow::Error),

    /// The agent file store failed.
    #[error("store error: {0}")]
    Store(#[from] dr_store::StoreError),

    /// The session was cancelled mid-run.
    #[error("session cancelled")]
    Cancelled,
}
