//! Writer stage (§4.9): synthesizes the agent's gathered material into a
//! markdown answer with mandatory inline `[n]` citations and a trailing
//! Sources section.

use dr_core::LanguageModel;
use dr_core::llm::{LLMRequest, Message};
use dr_graph::{ScrapedPage, SearchHit};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::SearchError;

#[derive(Debug, Deserialize, JsonSchema)]
struct WriterOutput {
    /// The full markdown answer: body text with inline `[n]` citations,
    /// followed by a `## Sources` section listing each numbered source.
    answer: String,
}

fn numbered_sources(sources: &[SearchHit]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(idx, s)| format!("[{}] {} — {}", idx + 1, s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn scraped_excerpts(pages: &[ScrapedPage]) -> String {
    pages
        .iter()
        .map(|p| {
            let title = p.title.clone().unwrap_or_else(|| p.url.clone());
            let excerpt: String = p.content.chars().take(1200).collect();
            format!("### {title} ({})\n{excerpt}", p.url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Writes the final cited markdown answer. `query` is used verbatim so the
/// writer can detect the answer's language from it, per §4.9.
pub async fn write_answer<LLM: LanguageModel>(
    llm: &LLM,
    query: &str,
    notes: &str,
    sources: &[SearchHit],
    scraped: &[ScrapedPage],
) -> Result<String, SearchError> {
    let system = "You are a writer that synthesizes research into a cited \
        answer. Every factual claim must carry an inline citation like [1] \
        referencing the numbered sources you were given. End with a \
        `## Sources` section listing every source you cited, numbered to \
        match. Answer in the same language as the query. If no sources were \
        gathered, answer from the notes alone and omit the Sources section.";
    let prompt = format!(
        "Query: {query}\n\nResearch notes:\n{notes}\n\nNumbered sources:\n{}\n\nScraped excerpts:\n{}",
        numbered_sources(sources),
        scraped_excerpts(scraped),
    );
    let request = LLMRequest::new(vec![Message::system(system), Message::user(prompt)]);

    let output: WriterOutput = llm.generate(request).await.map_err(SearchError::Writer)?;
    Ok(output.answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_one_indexed() {
        let sources = vec![
            SearchHit {
                title: "A".to_string(),
                url: "https://a.com".to_string(),
                snippet: String::new(),
                score: None,
                published_date: None,
            },
            SearchHit {
                title: "B".to_string(),
                url: "https://b.com".to_string(),
                snippet: String::new(),
                score: None,
                published_date: None,
            },
        ];
        let rendered = numbered_sources(&sources);
        assert!(rendered.starts_with("[1] A"));
        assert!(rendered.contains("[2] B"));
    }
}
