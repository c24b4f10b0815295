//! Concrete `LanguageModel`/`EmbeddingModel` backends.
//!
//! `dr-core` only defines the traits; nothing upstream implements them
//! against a real HTTP endpoint, so these clients exist purely in this
//! binary crate.

mod embedding;
mod error;
mod openai;

pub use embedding::OpenAiEmbeddingModel;
pub use error::OpenAiError;
pub use openai::OpenAiChatModel;
