//! The `Todo` record (§3) assigned to a researcher by the planner or the
//! supervisor.

use serde::{Deserialize, Serialize};

/// Priority of a todo, used to pick the next task within an agent's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Lowest priority; ordering puts these last.
    Low,
    /// Default priority.
    Medium,
    /// High priority.
    High,
    /// Highest priority; picked before all others.
    Critical,
}

/// Lifecycle status of a todo (Invariant I3/I4 match by title within this
/// status machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not yet started.
    Pending,
    /// Picked up by the owning researcher.
    InProgress,
    /// Completed; a `Finding` was produced.
    Done,
}

/// A unit of work assigned to one agent.
///
/// `title` is unique within an agent's todo list (Invariant I3) and, after
/// `create_agent_characteristics` runs, unique across the whole research
/// plan (Invariant I4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    /// Why this task exists, written by whoever created it.
    pub reasoning: String,
    /// Unique title; the key used for all `update_agent_todo` matches.
    pub title: String,
    /// What the researcher should investigate.
    pub objective: String,
    /// What shape the output should take.
    pub expected_output: String,
    /// Source types or domains the researcher is steered toward.
    pub sources_needed: Vec<String>,
    /// Scheduling priority.
    pub priority: Priority,
    /// Current lifecycle state.
    pub status: TodoStatus,
    /// Short note left by the researcher on completion (or by the
    /// supervisor on review).
    pub note: Option<String>,
    /// Optional URL the todo is most closely associated with.
    pub url: Option<String>,
}

impl Todo {
    /// Creates a new, `pending` todo with no note or URL.
    #[must_use]
    pub fn new(
        reasoning: impl Into<String>,
        title: impl Into<String>,
        objective: impl Into<String>,
        expected_output: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            reasoning: reasoning.into(),
            title: title.into(),
            objective: objective.into(),
            expected_output: expected_output.into(),
            sources_needed: Vec::new(),
            priority,
            status: TodoStatus::Pending,
            note: None,
            url: None,
        }
    }

    /// True if this todo is neither `done` nor currently being worked.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, TodoStatus::Pending)
    }
}

/// Picks the next todo to work by `(priority desc, creation order)`.
///
/// Creation order is the list's index, since `Vec<Todo>` preserves
/// insertion order and todos are never reordered in place.
#[must_use]
pub fn pick_next_pending(todos: &[Todo]) -> Option<usize> {
    todos
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_pending())
        .max_by_key(|(idx, t)| (t.priority, std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_priority_first() {
        let todos = vec![
            Todo::new("r", "a", "o", "e", Priority::Low),
            Todo::new("r", "b", "o", "e", Priority::Critical),
            Todo::new("r", "c", "o", "e", Priority::Medium),
        ];
        assert_eq!(pick_next_pending(&todos), Some(1));
    }

    #[test]
    fn picks_earliest_among_equal_priority() {
        let todos = vec![
            Todo::new("r", "a", "o", "e", Priority::High),
            Todo::new("r", "b", "o", "e", Priority::High),
        ];
        assert_eq!(pick_next_pending(&todos), Some(0));
    }

    #[test]
    fn skips_non_pending() {
        let mut todos = vec![Todo::new("r", "a", "o", "e", Priority::High)];
        todos[0].status = TodoStatus::Done;
        assert_eq!(pick_next_pending(&todos), None);
    }
}
