//! # dr-core
//!
//! `dr-core` hosts the no-std trait APIs that the rest of the deep-research
//! workspace (`dr-agent`, `dr-graph`, the `server` crate's provider
//! implementations) builds on to stay provider-agnostic: portable language
//! models and embeddings that any backend can implement.
//!
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │  dr-agent        │───▶│    dr-core       │◀───│   Providers     │
//! │  dr-graph        │    │   (this crate)   │    │                 │
//! │  server          │    │                  │    │ - openai        │
//! │                  │    │ - LanguageModel  │    │ - …             │
//! │                  │    │ - EmbeddingModel │    │                 │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```

//!
//! ## Supported AI Capabilities
//!
//! | Capability | Trait | Description |
//! |------------|-------|-------------|
//! | **Language Models** | [`LanguageModel`] | Streaming events (text, reasoning, tool calls) |
//! | **Embeddings** | [`EmbeddingModel`] | Convert text to vectors for semantic search |
//!
//! ## Examples
//!
//! ### Streaming Responses with Events
//!
//! ```rust,ignore
//! use dr_core::llm::{LanguageModel, Event, Message, LLMRequest, model::Parameters};
//! use futures_lite::StreamExt;
//!
//! async fn event_demo(model: impl LanguageModel) -> dr_core::Result {
//!     let request = LLMRequest::new([
//!         Message::user("Explain how rainbows form like I'm five."),
//!     ])
//!     .with_parameters(Parameters::default().include_reasoning(true));
//!
//!     let mut stream = model.respond(request);
//!     let mut answer = String::new();
//!
//!     while let Some(event) = stream.next().await {
//!         match event? {
//!             Event::Text(text) => answer.push_str(&text),
//!             Event::Reasoning(thought) => println!("thinking: {}", thought),
//!             Event::ToolCall(call) => println!("tool requested: {}", call.name),
//!             _ => {}
//!         }
//!     }
//!     Ok(answer)
//! }
//! ```
//!
//! ### Structured Output with Tools
//!
//! ```rust,ignore
//! use std::borrow::Cow;
//! use dr_core::{LanguageModel, llm::{LLMRequest, Message, Tool}};
//! use serde::{Deserialize, Serialize};
//! use schemars::JsonSchema;
//!
//! #[derive(JsonSchema, Deserialize, Serialize)]
//! struct WeatherQuery {
//!     location: String,
//!     units: Option<String>,
//! }
//!
//! struct WeatherTool;
//!
//! impl Tool for WeatherTool {
//!     fn name(&self) -> Cow<'static, str> {
//!         "get_weather".into()
//!     }
//!
//!     fn description(&self) -> Cow<'static, str> {
//!         "Get current weather for a location".into()
//!     }
//!
//!     type Arguments = WeatherQuery;
//!
//!     async fn call(&mut self, args: Self::Arguments) -> dr_core::Result {
//!         Ok(format!("Weather in {}: 22°C, sunny", args.location))
//!     }
//! }
//!
//! async fn weather_bot(model: impl LanguageModel) -> dr_core::Result {
//!     let mut weather = WeatherTool;
//!     let request = LLMRequest::new([Message::user("What's the weather like in Tokyo?")])
//!         .with_tool(&weather);
//!
//!     // Model can now call the weather tool automatically
//!     let response: String = model.generate(request).await?;
//!     Ok(response)
//! }
//! ```
//!
//! See [`llm::tool`] for more details on using tools with language models.
//!
//! ### Semantic Search with Embeddings
//!
//! ```rust
//! use dr_core::EmbeddingModel;
//!
//! async fn find_similar_docs(
//!     model: impl EmbeddingModel,
//!     query: &str,
//!     documents: &[&str]
//! ) -> dr_core::Result<Vec<f32>> {
//!     // Convert query to vector
//!     let query_embedding = model.embed(query).await?;
//!
//!     // In a real app, you'd compare with document embeddings
//!     // and find the most similar ones using cosine similarity
//!
//!     Ok(query_embedding)
//! }
//! ```
//!
//! ## Modules
//!
//! - [`embedding`] — turn text into dense vectors.
//! - [`llm`] — request builders, messages, provider traits, reasoning streams.
//!
//!

#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;

// Re-export procedural macros
#[cfg(feature = "derive")]
pub use crate::llm::tool::tool;
