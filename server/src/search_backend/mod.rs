//! Concrete `SearchProvider` backends, picked at startup by which §6
//! environment variable is configured.

mod searxng;
mod tavily;

pub use searxng::SearxngProvider;
pub use tavily::TavilyProvider;
