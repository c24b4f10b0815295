//! Smart context compression for managing conversation history.

use std::collections::{HashMap, HashSet};

use dr_core::{LanguageModel, llm::Message};

/// Strategy for managing conversation context.
#[derive(Debug, Clone)]
pub enum ContextStrategy {
    /// No compression - keep all messages until context is full, then stop.
    Unlimited,

    /// Smart compression with selective preservation (default).
    Smart(SmartCompressionConfig),
}

impl Default for ContextStrategy {
    fn default() -> Self {
        Self::Smart(SmartCompressionConfig::default())
    }
}

/// Configuration for smart context compression.
#[derive(Debug, Clone)]
pub struct SmartCompressionConfig {
    /// Trigger compression at this fraction of context window (default: 0.7).
    pub trigger_threshold: f32,

    /// Emergency compaction threshold (default: 0.9).
    pub emergency_threshold: f32,

    /// Number of recent messages to always keep verbatim.
    pub preserve_recent: usize,

    /// Types of content to preserve during compression.
    pub preserve: PreserveConfig,

    /// Compression level (trade-off between quality and size).
    pub level: CompressionLevel,
}

impl Default for SmartCompressionConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.7,
            emergency_threshold: 0.9,
            preserve_recent: 8,
            preserve: PreserveConfig::default(),
            level: CompressionLevel::Standard,
        }
    }
}

/// Configuration for what content to preserve during compression.
#[derive(Debug, Clone)]
pub struct PreserveConfig {
    /// Keep cited source URLs verbatim.
    pub citations: bool,
    /// Keep error messages verbatim.
    pub errors: bool,
    /// Keep the search queries that were issued verbatim.
    pub search_queries: bool,
    /// Keep quoted passages from scraped pages verbatim (if false, summarize instead).
    pub quoted_passages: bool,
    /// Keep tool results verbatim (if false, compress).
    pub tool_results: bool,
}

impl Default for PreserveConfig {
    fn default() -> Self {
        Self {
            citations: true,
            errors: true,
            search_queries: true,
            quoted_passages: false,
            tool_results: false,
        }
    }
}

/// Compression aggressiveness level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Keep more detail, less compression.
    Light,
    /// Balanced compression.
    #[default]
    Standard,
    /// Maximum compression.
    Aggressive,
}

/// Content extracted and preserved during compression.
#[derive(Debug, Default)]
pub struct PreservedContent {
    /// Cited source URLs found in messages.
    pub citations: Vec<String>,
    /// Error messages found.
    pub errors: Vec<String>,
    /// Search queries found.
    pub search_queries: Vec<String>,
}

/// Estimate tokens in a string (rough approximation: ~4 chars per token).
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    content.len() / 4
}

/// Estimate context usage as a fraction of the window.
#[must_use]
pub fn estimate_context_usage(messages: &[Message], context_window: usize) -> f32 {
    let message_tokens: usize = messages.iter().map(|m| estimate_tokens(m.content())).sum();
    message_tokens as f32 / context_window as f32
}

// Prompt templates loaded from files
const COMPRESSION_SYSTEM_PROMPT: &str = include_str!("prompts/compression_system.txt");
const COMPRESSION_USER_TEMPLATE: &str = include_str!("prompts/compression_user.txt");
const COMPRESSION_URLS_TEMPLATE: &str = include_str!("prompts/compression_urls.txt");

/// Result of a compaction operation with URL tracking.
#[derive(Debug, Clone)]
pub struct CompactionResult {
    /// The generated summary text.
    pub summary: String,
    /// URLs that were referenced in the summary (should be written to disk).
    pub referenced_urls: HashSet<String>,
}

/// A pending URL allocation for content that hasn't been written to disk.
#[derive(Debug, Clone)]
pub struct ContentWithUrl {
    /// The content in text form.
    pub content: String,
    /// The allocated URL for this content.
    pub url: String,
}

impl SmartCompressionConfig {
    /// Reserve 20% of context for the compaction process itself.
    pub const COMPACTION_RESERVE: f32 = 0.2;

    /// Returns the effective trigger threshold accounting for compaction reserve.
    ///
    /// The actual trigger is lower than `trigger_threshold` to leave room
    /// for the fast LLM to see both URLs and original content during compaction.
    #[must_use]
    pub fn effective_trigger(&self) -> f32 {
        self.trigger_threshold - Self::COMPACTION_RESERVE
    }

    /// Extract content that should be preserved from messages.
    #[must_use]
    pub fn extract_preserved(&self, messages: &[Message]) -> PreservedContent {
        let mut preserved = PreservedContent::default();

        for msg in messages {
            let content = msg.content();

            if self.preserve.citations {
                preserved.citations.extend(extract_citations(content));
            }

            if self.preserve.errors {
                preserved.errors.extend(extract_errors(content));
            }

            if self.preserve.search_queries {
                preserved
                    .search_queries
                    .extend(extract_search_queries(content));
            }
        }

        preserved
    }

    /// Identify indices of stale tool calls that can be safely removed.
    ///
    /// Stale tool calls include:
    /// - Tool results that were just acknowledgments
    /// - Scrapes of a URL that was later re-scraped (superseded)
    #[must_use]
    pub fn find_stale_tool_calls(&self, messages: &[Message]) -> HashSet<usize> {
        let mut stale = HashSet::new();
        let mut scrape_versions: HashMap<String, usize> = HashMap::new();

        for (idx, msg) in messages.iter().enumerate() {
            let content = msg.content();

            // Check for trivial results
            if is_trivial_result(content) {
                stale.insert(idx);
            }

            // Track scrapes that may be superseded by a later scrape of the same URL
            if content.contains("scrape_url") || content.contains("scrape") {
                if let Some(url) = extract_single_citation(content) {
                    if let Some(&later_idx) = scrape_versions.get(&url) {
                        if later_idx > idx {
                            stale.insert(idx);
                        }
                    }
                    scrape_versions.insert(url, idx);
                }
            }
        }

        stale
    }

    /// Generate a compressed summary of messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM fails to generate a summary.
    pub async fn generate_summary<LLM: LanguageModel>(
        &self,
        llm: &LLM,
        messages: &[Message],
        preserved: &PreservedContent,
    ) -> Result<String, LLM::Error> {
        let prompt = COMPRESSION_USER_TEMPLATE
            .replace("{citations}", &preserved.citations.join(", "))
            .replace("{errors}", &preserved.errors.join("\n"))
            .replace("{search_queries}", &preserved.search_queries.join("\n"))
            .replace("{dialogue}", &format_messages(messages));

        let request = dr_core::llm::oneshot(COMPRESSION_SYSTEM_PROMPT, prompt);
        let stream = llm.respond(request);
        dr_core::llm::collect_text(stream).await
    }

    /// Generate a compressed summary with URL tracking for tool outputs.
    ///
    /// This method:
    /// 1. Takes messages and their associated pending URLs
    /// 2. Generates a summary that may reference those URLs
    /// 3. Scans the summary to find which URLs were actually referenced
    /// 4. Returns both the summary and the set of referenced URLs
    ///
    /// The caller should only write files for URLs that appear in `referenced_urls`.
    ///
    /// # Arguments
    ///
    /// * `llm` - The fast LLM to use for summary generation
    /// * `messages` - Messages to compress
    /// * `preserved` - Content to preserve verbatim
    /// * `pending_urls` - Map of message content to allocated URLs
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM fails to generate a summary.
    pub async fn generate_summary_with_urls<LLM: LanguageModel>(
        &self,
        llm: &LLM,
        messages: &[Message],
        preserved: &PreservedContent,
        pending_urls: &[ContentWithUrl],
    ) -> Result<CompactionResult, LLM::Error> {
        // Build content with URLs section
        let content_with_urls = format_content_with_urls(messages, pending_urls);

        let prompt = COMPRESSION_URLS_TEMPLATE
            .replace("{content_with_urls}", &content_with_urls)
            .replace("{citations}", &preserved.citations.join(", "))
            .replace("{errors}", &preserved.errors.join("\n"))
            .replace("{search_queries}", &preserved.search_queries.join("\n"));

        let request = dr_core::llm::oneshot(COMPRESSION_SYSTEM_PROMPT, prompt);
        let stream = llm.respond(request);
        let summary = dr_core::llm::collect_text(stream).await?;

        // Extract which URLs were actually referenced
        let referenced_urls = extract_referenced_urls(&summary);

        Ok(CompactionResult {
            summary,
            referenced_urls,
        })
    }
}

/// Extract cited source URLs from content.
fn extract_citations(content: &str) -> Vec<String> {
    let mut urls = Vec::new();

    for word in content.split_whitespace() {
        let word = word.trim_matches(|c: char| {
            c == '"' || c == '\'' || c == '`' || c == ',' || c == ')' || c == ']' || c == '.'
        });

        if (word.starts_with("http://") || word.starts_with("https://")) && word.len() > 8 {
            urls.push(word.to_string());
        }
    }

    urls.sort();
    urls.dedup();
    urls
}

/// Extract a single citation URL from content (for scrape staleness tracking).
fn extract_single_citation(content: &str) -> Option<String> {
    extract_citations(content).into_iter().next()
}

/// Extract error messages from content.
fn extract_errors(content: &str) -> Vec<String> {
    let mut errors = Vec::new();

    // Look for common error patterns
    for line in content.lines() {
        let lower = line.to_lowercase();
        if lower.contains("error")
            || lower.contains("failed")
            || lower.contains("panic")
            || lower.contains("exception")
        {
            errors.push(line.trim().to_string());
        }
    }

    errors
}

/// Extract search queries from content.
///
/// Looks for `query: "..."` style annotations left by the search tool, plus
/// bare quoted strings on lines that mention searching.
fn extract_search_queries(content: &str) -> Vec<String> {
    let mut queries = Vec::new();

    for line in content.lines() {
        let lower = line.to_lowercase();
        if !(lower.contains("search") || lower.contains("query") || lower.contains("queried")) {
            continue;
        }

        let mut rest = line;
        while let Some(start) = rest.find('"') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('"') else { break };
            let quoted = &after[..end];
            if !quoted.is_empty() {
                queries.push(quoted.to_string());
            }
            rest = &after[end + 1..];
        }
    }

    queries
}

/// Check if a tool result is trivial (just an acknowledgment).
fn is_trivial_result(result: &str) -> bool {
    let trivial_patterns = [
        "ok",
        "success",
        "done",
        "file written",
        "file saved",
        "completed",
    ];
    let lower = result.to_lowercase();
    trivial_patterns.iter().any(|t| lower.contains(t)) && result.len() < 50
}

/// Format messages for compression prompt.
fn format_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| format!("{:?}: {}", msg.role(), msg.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format messages with their associated URLs for compression.
///
/// Each message is formatted with its URL header (if it has one).
fn format_content_with_urls(messages: &[Message], pending_urls: &[ContentWithUrl]) -> String {
    let mut output = String::new();

    for msg in messages {
        let content = msg.content();

        // Check if this message content has a pending URL
        let url = pending_urls.iter().find(|p| p.content == content);

        if let Some(url_info) = url {
            // Format with URL header
            output.push_str(&format!(
                "### [URL: {}]\n{}\n\n",
                url_info.url, content
            ));
        } else {
            // Format without URL (inline content)
            output.push_str(&format!(
                "### [Inline - {:?}]\n{}\n\n",
                msg.role(),
                content
            ));
        }
    }

    output
}

/// Extract draft-artifact paths referenced in a summary.
///
/// Scans the summary for paths like "items/oak-river-survey.md" and returns
/// the set of all found paths.
///
/// # Example
///
/// ```rust,ignore
/// use dr_agent::compression::extract_referenced_urls;
///
/// let summary = "The agent saved notes to items/market-sizing-survey.md.";
/// let urls = extract_referenced_urls(summary);
/// assert!(urls.contains("items/market-sizing-survey.md"));
/// ```
#[must_use]
pub fn extract_referenced_urls(summary: &str) -> HashSet<String> {
    let mut urls = HashSet::new();

    for word in summary.split_whitespace() {
        let word = word.trim_matches(|c: char| {
            c == '"' || c == '\'' || c == '`' || c == ',' || c == '.' || c == ')' || c == ']'
        });

        if word.starts_with("items/") {
            let filename = word.strip_prefix("items/").unwrap_or("");
            if is_valid_item_filename(filename) {
                urls.insert(word.to_string());
            }
        }
    }

    urls
}

/// Check if a filename matches the `slug.md` pattern used by draft artifacts.
fn is_valid_item_filename(filename: &str) -> bool {
    let Some((slug, ext)) = filename.rsplit_once('.') else {
        return false;
    };

    if ext != "md" {
        return false;
    }

    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_citations() {
        let content = "See https://example.com/report and also https://example.org/data.json";
        let citations = extract_citations(content);
        assert!(citations.contains(&"https://example.com/report".to_string()));
        assert!(citations.contains(&"https://example.org/data.json".to_string()));
    }

    #[test]
    fn test_extract_search_queries() {
        let content = "Ran a web search for \"renewable energy subsidies 2025\" to find sources.";
        let queries = extract_search_queries(content);
        assert!(queries.contains(&"renewable energy subsidies 2025".to_string()));
    }

    #[test]
    fn test_trivial_result() {
        assert!(is_trivial_result("OK"));
        assert!(is_trivial_result("File written successfully"));
        assert!(!is_trivial_result(
            "This is a long result with actual content that should be preserved"
        ));
    }

    #[test]
    fn test_estimate_tokens() {
        let content = "This is a test string with some content";
        let tokens = estimate_tokens(content);
        assert!(tokens > 0);
        assert!(tokens < content.len());
    }

    #[test]
    fn test_extract_referenced_urls() {
        let summary = "The agent saved notes to items/market-sizing-survey.md and items/competitor-landscape.md.";
        let urls = extract_referenced_urls(summary);
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("items/market-sizing-survey.md"));
        assert!(urls.contains("items/competitor-landscape.md"));
    }

    #[test]
    fn test_extract_urls_with_punctuation() {
        let summary = r#"See "items/quarterly-trends.md" for details."#;
        let urls = extract_referenced_urls(summary);
        assert!(urls.contains("items/quarterly-trends.md"));
    }

    #[test]
    fn test_invalid_url_patterns() {
        let summary = "Not valid: items/Upper-Case.md items/no-extension items/wrong.txt";
        let urls = extract_referenced_urls(summary);
        assert!(urls.is_empty());
    }

    #[test]
    fn test_valid_item_filename() {
        assert!(is_valid_item_filename("market-sizing-survey.md"));
        assert!(is_valid_item_filename("q3-trends.md"));
        assert!(!is_valid_item_filename("no-extension"));
        assert!(!is_valid_item_filename("wrong.txt"));
        assert!(!is_valid_item_filename("Upper-Case.md"));
    }
}
