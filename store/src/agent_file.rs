//! Per-agent markdown-backed record (§3 `agents/<agent_id>.md`) and the
//! store that guards concurrent access to it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_lite::AsyncWriteExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::todo::Todo;

/// A note an agent has saved, optionally shared with its siblings via the
/// supervisor's shared-memory view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNote {
    /// Short title.
    pub title: String,
    /// Body of the note.
    pub summary: String,
    /// Source URLs backing the note.
    pub urls: Vec<String>,
    /// Free-form tags for later lookup.
    pub tags: Vec<String>,
    /// Whether `read_shared_notes` should surface this to other agents.
    pub shared: bool,
}

/// The persisted record for one agent: character, preferences, todos, and
/// notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFile {
    /// The agent's assigned role/expertise/personality blurb.
    pub character: Option<String>,
    /// Free-form operating preferences for this agent.
    pub preferences: Option<String>,
    /// The agent's todo list.
    pub todos: Vec<Todo>,
    /// Notes the agent has written.
    pub notes: Vec<AgentNote>,
}

impl AgentFile {
    fn to_markdown(&self, agent_id: &str) -> String {
        let mut out = format!("# Agent: {agent_id}\n\n");
        if let Some(character) = &self.character {
            out.push_str("## Character\n\n");
            out.push_str(character);
            out.push_str("\n\n");
        }
        if let Some(preferences) = &self.preferences {
            out.push_str("## Preferences\n\n");
            out.push_str(preferences);
            out.push_str("\n\n");
        }
        out.push_str("## Todos\n\n```json\n");
        out.push_str(&serde_json::to_string_pretty(&self.todos).unwrap_or_default());
        out.push_str("\n```\n\n## Notes\n\n```json\n");
        out.push_str(&serde_json::to_string_pretty(&self.notes).unwrap_or_default());
        out.push_str("\n```\n");
        out
    }
}

/// Parses the `## Todos`/`## Notes` fenced JSON blocks written by
/// [`AgentFile::to_markdown`]. Tolerates a missing block (treated as empty).
fn parse_markdown(agent_id: &str, text: &str) -> Result<AgentFile, StoreError> {
    let character = extract_section(text, "## Character");
    let preferences = extract_section(text, "## Preferences");
    let todos = extract_json_block(text, "## Todos")
        .map(|block| serde_json::from_str(&block))
        .transpose()
        .map_err(|source| StoreError::Corrupt {
            agent_id: agent_id.to_string(),
            source,
        })?
        .unwrap_or_default();
    let notes = extract_json_block(text, "## Notes")
        .map(|block| serde_json::from_str(&block))
        .transpose()
        .map_err(|source| StoreError::Corrupt {
            agent_id: agent_id.to_string(),
            source,
        })?
        .unwrap_or_default();

    Ok(AgentFile {
        character,
        preferences,
        todos,
        notes,
    })
}

fn extract_section(text: &str, heading: &str) -> Option<String> {
    let start = text.find(heading)? + heading.len();
    let rest = &text[start..];
    let end = rest.find("\n## ").unwrap_or(rest.len());
    let body = rest[..end].trim();
    if body.is_empty() || body.starts_with("```") {
        None
    } else {
        Some(body.to_string())
    }
}

fn extract_json_block(text: &str, heading: &str) -> Option<String> {
    let start = text.find(heading)?;
    let fence_start = text[start..].find("```json")? + start + "```json".len();
    let fence_end = text[fence_start..].find("```")? + fence_start;
    Some(text[fence_start..fence_end].trim().to_string())
}

/// File-backed key-value store rooted under the session's memory
/// directory, keyed by `agent_id`.
///
/// Writes to a single `agent_id` are serialised by a per-agent lock; reads
/// are lock-free and see the last committed snapshot.
#[derive(Debug)]
pub struct AgentFileStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AgentFileStore {
    /// Opens a store rooted at `root` (created lazily on first write).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Routes the two session-root singleton artifacts (`main.md`,
    /// `draft_report.md`) to their own files, distinct from the
    /// `agents/<agent_id>.md` namespace used for real researchers — so
    /// `list_agent_ids` never mistakes them for researcher ids.
    fn path_for(&self, agent_id: &str) -> PathBuf {
        match agent_id {
            "main" => self.root.join("main.md"),
            "draft_report" => self.root.join("draft_report.md"),
            _ => self.root.join("agents").join(format!("{agent_id}.md")),
        }
    }

    async fn lock_for(&self, agent_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reads the agent's file, or an empty default if it doesn't exist yet.
    pub async fn read_agent_file(&self, agent_id: &str) -> Result<AgentFile, StoreError> {
        let path = self.path_for(agent_id);
        match async_fs::read_to_string(&path).await {
            Ok(text) => parse_markdown(agent_id, &text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AgentFile::default()),
            Err(source) => Err(StoreError::Io {
                agent_id: agent_id.to_string(),
                source,
            }),
        }
    }

    /// Overwrites the agent's file atomically (write to a temp file, then
    /// rename over the original).
    pub async fn write_agent_file(
        &self,
        agent_id: &str,
        file: &AgentFile,
    ) -> Result<(), StoreError> {
        let guard = self.lock_for(agent_id).await;
        let _permit = guard.lock().await;

        let path = self.path_for(agent_id);
        if let Some(dir) = path.parent() {
            async_fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::Io {
                    agent_id: agent_id.to_string(),
                    source,
                })?;
        }

        let tmp_path = path.with_extension("md.tmp");
        let markdown = file.to_markdown(agent_id);

        let mut tmp = async_fs::File::create(&tmp_path)
            .await
            .map_err(|source| StoreError::Io {
                agent_id: agent_id.to_string(),
                source,
            })?;
        tmp.write_all(markdown.as_bytes())
            .await
            .map_err(|source| StoreError::Io {
                agent_id: agent_id.to_string(),
                source,
            })?;
        tmp.flush().await.map_err(|source| StoreError::Io {
            agent_id: agent_id.to_string(),
            source,
        })?;

        async_fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StoreError::Io {
                agent_id: agent_id.to_string(),
                source,
            })
    }

    /// Mutates a single todo matched by title (Invariant I3). Returns
    /// [`StoreError::TodoNotFound`] if no todo with that title exists.
    pub async fn update_agent_todo(
        &self,
        agent_id: &str,
        title: &str,
        patch: impl FnOnce(&mut Todo),
    ) -> Result<(), StoreError> {
        let guard = self.lock_for(agent_id).await;
        let _permit = guard.lock().await;

        let mut file = self.read_agent_file(agent_id).await?;
        let todo = file
            .todos
            .iter_mut()
            .find(|t| t.title.eq_ignore_ascii_case(title))
            .ok_or_else(|| StoreError::TodoNotFound {
                agent_id: agent_id.to_string(),
                title: title.to_string(),
            })?;
        patch(todo);
        drop(_permit);
        self.write_agent_file(agent_id, &file).await
    }

    /// Removes an agent's file entirely.
    pub async fn delete_agent_file(&self, agent_id: &str) -> Result<(), StoreError> {
        let guard = self.lock_for(agent_id).await;
        let _permit = guard.lock().await;
        match async_fs::remove_file(self.path_for(agent_id)).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    /// Lists agent ids that currently have a file on disk.
    pub async fn list_agent_ids(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join("agents");
        let mut ids = Vec::new();
        let mut entries = match async_fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(source) => {
                return Err(StoreError::Io {
                    agent_id: String::new(),
                    source,
                });
            }
        };

        use futures_lite::StreamExt;
        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(|source| StoreError::Io {
                agent_id: String::new(),
                source,
            })?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if stem != "supervisor" {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::{Priority, TodoStatus};

    #[tokio::test]
    async fn round_trips_through_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentFileStore::new(dir.path());

        let mut file = AgentFile {
            character: Some("curious historian".to_string()),
            ..Default::default()
        };
        file.todos
            .push(Todo::new("reason", "dig up sources", "objective", "list", Priority::High));

        store.write_agent_file("agent-1", &file).await.unwrap();
        let loaded = store.read_agent_file("agent-1").await.unwrap();

        assert_eq!(loaded.character.as_deref(), Some("curious historian"));
        assert_eq!(loaded.todos.len(), 1);
        assert_eq!(loaded.todos[0].title, "dig up sources");
    }

    #[tokio::test]
    async fn missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentFileStore::new(dir.path());
        let file = store.read_agent_file("nobody").await.unwrap();
        assert!(file.todos.is_empty());
    }

    #[tokio::test]
    async fn update_agent_todo_matches_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentFileStore::new(dir.path());

        let mut file = AgentFile::default();
        file.todos
            .push(Todo::new("r", "investigate x", "o", "e", Priority::Medium));
        store.write_agent_file("agent-2", &file).await.unwrap();

        store
            .update_agent_todo("agent-2", "investigate x", |todo| {
                todo.status = TodoStatus::Done;
                todo.note = Some("found three sources".to_string());
            })
            .await
            .unwrap();

        let loaded = store.read_agent_file("agent-2").await.unwrap();
        assert_eq!(loaded.todos[0].status, TodoStatus::Done);
        assert_eq!(loaded.todos[0].note.as_deref(), Some("found three sources"));
    }

    #[tokio::test]
    async fn update_missing_todo_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentFileStore::new(dir.path());
        let err = store
            .update_agent_todo("agent-3", "nope", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TodoNotFound { .. }));
    }
}
