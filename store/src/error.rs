//! Error type for the agent file store and review queue.

/// Errors surfaced by [`crate::AgentFileStore`] and [`crate::SupervisorQueue`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No todo with the given title exists on the agent's file.
    #[error("todo '{title}' not found for agent '{agent_id}'")]
    TodoNotFound {
        /// The agent whose file was searched.
        agent_id: String,
        /// The title that was looked up.
        title: String,
    },

    /// A `create_agent_todo` call supplied a title already present on the
    /// agent's file after auto-qualification was attempted.
    #[error("duplicate todo title '{title}' for agent '{agent_id}'")]
    DuplicateTitle {
        /// The agent whose file rejected the title.
        agent_id: String,
        /// The colliding title.
        title: String,
    },

    /// Reading or writing the on-disk record failed.
    #[error("I/O error on agent file '{agent_id}': {source}")]
    Io {
        /// The agent whose file failed to read/write.
        agent_id: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The on-disk record could not be parsed.
    #[error("corrupt agent file '{agent_id}': {source}")]
    Corrupt {
        /// The agent whose file failed to parse.
        agent_id: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}
