//! Shared todo list that the agent exposes to the model as a tool.
//!
//! The list lives behind a shared handle so the running [`crate::agent::Agent`]
//! loop can read the latest state right after the model calls the `todo` tool,
//! without routing the update through the regular tool-call result string.

use std::sync::{Arc, Mutex};

use dr_core::llm::Tool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of a single todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently being worked on. At most one item should carry this status.
    InProgress,
    /// Finished.
    Completed,
}

/// A single entry in the agent's todo list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TodoItem {
    /// Imperative description of the task, e.g. "Draft the introduction section".
    pub content: String,
    /// Present-continuous form shown while the task is in progress, e.g.
    /// "Drafting the introduction section".
    pub active_form: String,
    /// Current status.
    pub status: TodoStatus,
}

/// Ordered list of todo items shared between the `todo` tool and the agent loop.
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    /// Returns a snapshot of the current items.
    #[must_use]
    pub fn items(&self) -> Vec<TodoItem> {
        self.items.clone()
    }

    /// Replaces the entire list.
    pub fn replace(&mut self, items: Vec<TodoItem>) {
        self.items = items;
    }

    /// Returns `true` if the list has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if every item is completed (an empty list is not complete).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.status == TodoStatus::Completed)
    }
}

/// Arguments accepted by the `todo` tool: a full replacement of the list.
#[derive(Debug, JsonSchema, Deserialize)]
pub struct TodoWriteArgs {
    /// Complete, ordered list of todos. Replaces whatever was there before, so
    /// include every item (including ones already completed) on every call.
    pub todos: Vec<TodoItem>,
}

/// Tool that lets the model read and rewrite the shared todo list.
///
/// Holds a shared handle rather than owning the list so the agent loop can
/// inspect the result of a call immediately after it returns.
pub struct TodoWriteTool {
    shared: Arc<Mutex<TodoList>>,
}

impl TodoWriteTool {
    /// Creates a tool backed by the given shared list.
    #[must_use]
    pub const fn new(shared: Arc<Mutex<TodoList>>) -> Self {
        Self { shared }
    }
}

impl Tool for TodoWriteTool {
    fn name(&self) -> std::borrow::Cow<'static, str> {
        "todo".into()
    }

    fn description(&self) -> std::borrow::Cow<'static, str> {
        "Creates or updates the agent's todo list. Call this to track progress on \
         multi-step work: pass the complete, ordered list of todos every time, with \
         at most one item `in_progress`."
            .into()
    }

    type Arguments = TodoWriteArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> dr_core::Result {
        let count = arguments.todos.len();
        self.shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(arguments.todos);
        Ok(format!("Todo list updated ({count} item(s))."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, status: TodoStatus) -> TodoItem {
        TodoItem {
            content: content.to_string(),
            active_form: content.to_string(),
            status,
        }
    }

    #[test]
    fn empty_list_is_not_complete() {
        let list = TodoList::default();
        assert!(list.is_empty());
        assert!(!list.is_complete());
    }

    #[test]
    fn replace_updates_items() {
        let mut list = TodoList::default();
        list.replace(vec![item("a", TodoStatus::Pending)]);
        assert_eq!(list.items().len(), 1);
        assert!(!list.is_complete());
    }

    #[test]
    fn all_completed_is_complete() {
        let mut list = TodoList::default();
        list.replace(vec![
            item("a", TodoStatus::Completed),
            item("b", TodoStatus::Completed),
        ]);
        assert!(list.is_complete());
    }

    #[tokio::test]
    async fn tool_call_replaces_shared_list() {
        let shared = Arc::new(Mutex::new(TodoList::default()));
        let mut tool = TodoWriteTool::new(shared.clone());

        tool.call(TodoWriteArgs {
            todos: vec![item("write report", TodoStatus::InProgress)],
        })
        .await
        .unwrap();

        let items = shared.lock().unwrap().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, TodoStatus::InProgress);
    }
}
