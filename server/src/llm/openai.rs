//! `LanguageModel` backed by any OpenAI-compatible `/chat/completions` endpoint.
//!
//! Structured the way the teacher's own `aither-openai` client is structured
//! (an `Arc`-wrapped `Config` behind a cheaply-`Clone`-able handle), but
//! talks over `reqwest` instead of `zenwave` and hand-parses the
//! `chat.completions` SSE stream the way `sven-model`'s `openai_compat`
//! driver does, since neither crate is available here.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use dr_core::llm::model::Profile;
use dr_core::llm::tool::ToolDefinition;
use dr_core::llm::{Event, LLMRequest, LanguageModel, Message, Usage};
use futures_core::Stream;
use futures_lite::StreamExt;
use serde_json::{Value, json};

use super::error::OpenAiError;

#[derive(Debug, Clone)]
struct Config {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    context_window: usize,
}

impl Config {
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// A chat-completions model reachable over HTTP, configured from
/// `OPENAI_BASE_URL`/`OPENAI_API_KEY` (§6).
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    inner: Arc<Config>,
}

impl OpenAiChatModel {
    /// Builds a client for `base_url` (no trailing `/chat/completions`),
    /// optionally authenticated with a bearer `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Config {
                http: reqwest::Client::new(),
                base_url: base_url.into(),
                api_key,
                model: model.into(),
                context_window: 128_000,
            }),
        }
    }

    /// Overrides the context window reported by [`profile`](LanguageModel::profile).
    #[must_use]
    pub fn with_context_window(mut self, tokens: usize) -> Self {
        Arc::make_mut(&mut self.inner).context_window = tokens;
        self
    }
}

fn to_openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::User { content, .. } => json!({ "role": "user", "content": content }),
            Message::System { content } => json!({ "role": "system", "content": content }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                if tool_calls.is_empty() {
                    json!({ "role": "assistant", "content": content })
                } else {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    json!({ "role": "assistant", "content": content, "tool_calls": calls })
                }
            }
            Message::Tool {
                content,
                tool_call_id,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
        })
        .collect()
}

fn to_openai_tools(definitions: &[ToolDefinition]) -> Vec<Value> {
    definitions
        .iter()
        .map(|definition| {
            json!({
                "type": "function",
                "function": {
                    "name": definition.name(),
                    "description": definition.description(),
                    "parameters": definition.arguments_schema(),
                },
            })
        })
        .collect()
}

/// Accumulates one streamed tool call's `name`/`arguments` deltas by index,
/// since OpenAI streams both incrementally while `dr_core`'s `ToolCall`
/// needs a complete `id`/`name`/`arguments` triple.
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn finish(self) -> Option<dr_core::llm::ToolCall> {
        if self.name.is_empty() {
            return None;
        }
        let arguments = if self.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&self.arguments).unwrap_or(Value::Null)
        };
        Some(dr_core::llm::ToolCall::new(self.id, self.name, arguments))
    }
}

/// Parses one `data: {...}` chunk of a `chat.completions` SSE stream,
/// folding tool-call deltas into `pending` and returning any events ready
/// to emit immediately (text/reasoning/usage).
fn parse_chunk(value: &Value, pending: &mut BTreeMap<u64, PendingToolCall>) -> Vec<Event> {
    let mut events = Vec::new();

    if let Some(usage) = value.get("usage").filter(|u| !u.is_null()) {
        let prompt = usage
            .get("prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let completion = usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        events.push(Event::Usage(Usage::new(prompt, completion)));
    }

    let Some(delta) = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
    else {
        return events;
    };

    if let Some(reasoning) = delta
        .get("reasoning_content")
        .or_else(|| delta.get("reasoning"))
        .and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        events.push(Event::Reasoning(reasoning.to_string()));
    }

    if let Some(text) = delta.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        events.push(Event::Text(text.to_string()));
    }

    if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let index = call.get("index").and_then(Value::as_u64).unwrap_or(0);
            let entry = pending.entry(index).or_default();
            if let Some(id) = call.get("id").and_then(Value::as_str) {
                entry.id = id.to_string();
            }
            if let Some(function) = call.get("function") {
                if let Some(name) = function.get("name").and_then(Value::as_str) {
                    entry.name.push_str(name);
                }
                if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                    entry.arguments.push_str(args);
                }
            }
        }
    }

    events
}

impl LanguageModel for OpenAiChatModel {
    type Error = OpenAiError;

    fn respond(&self, request: LLMRequest) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        let config = self.inner.clone();

        async_stream::stream! {
            let (messages, parameters, tool_definitions) = request.into_parts();

            let mut body = json!({
                "model": config.model,
                "messages": to_openai_messages(&messages),
                "stream": true,
                "stream_options": { "include_usage": true },
            });
            if let Some(temperature) = parameters.temperature {
                body["temperature"] = json!(temperature);
            }
            if let Some(max_tokens) = parameters.max_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if !tool_definitions.is_empty() {
                body["tools"] = json!(to_openai_tools(&tool_definitions));
            }

            let mut builder = config.http.post(config.chat_url()).json(&body);
            if let Some(api_key) = &config.api_key {
                builder = builder.bearer_auth(api_key);
            }

            let response = match builder.send().await.and_then(reqwest::Response::error_for_status) {
                Ok(response) => response,
                Err(error) => {
                    yield Err(OpenAiError::from(error));
                    return;
                }
            };

            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut pending: BTreeMap<u64, PendingToolCall> = BTreeMap::new();

            'stream: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        yield Err(OpenAiError::from(error));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'stream;
                    }
                    let Ok(value) = serde_json::from_str::<Value>(data) else {
                        continue;
                    };
                    for event in parse_chunk(&value, &mut pending) {
                        yield Ok(event);
                    }
                }
            }

            for (_, call) in pending {
                if let Some(call) = call.finish() {
                    yield Ok(Event::ToolCall(call));
                }
            }
        }
    }

    fn profile(&self) -> impl Future<Output = Profile> + Send {
        let config = self.inner.clone();
        async move {
            Profile::new(
                "openai",
                config.model.clone(),
                config.model.clone(),
                "OpenAI-compatible chat completions model",
                config.context_window,
            )
        }
    }
}
