//! Agent file store (C4) and supervisor review queue (C5).
//!
//! The file store persists per-agent todos, notes, and character under a
//! session-scoped memory root; the review queue is a FIFO of
//! agent-completion events that the supervisor drains in batches.

mod agent_file;
mod error;
mod queue;
mod todo;

pub use agent_file::{AgentFile, AgentFileStore};
pub use error::StoreError;
pub use queue::{SupervisorEvent, SupervisorQueue};
pub use todo::{Priority, Todo, TodoStatus};
