//! Streaming generator (C8): a per-session SSE event bus with bounded
//! replay history, and a typed emitter over it matching the closed event
//! set of §4.8.

mod bus;
mod error;
mod event;
mod generator;

pub use bus::{SessionBus, StreamingHub};
pub use error::StreamingError;
pub use event::{StreamEvent, StreamEventType};
pub use generator::{chunk_text, truncate_preview, ResearchStreamingGenerator, MAX_CHUNK_LEN};
