//! Renders a finished research report (markdown) into a paginated PDF
//! (C10): a `## Sources` section becomes a footnote table, and inline
//! `[n]` citation markers become clickable links into it.

mod citations;
mod error;
mod font;
mod markdown;
mod writer;

pub use citations::{extract_sources, find_citation_marks, CitationMark, Source, SourceMap};
pub use error::PdfError;
pub use markdown::{parse_markdown, ContentBlock, ParsedContent, TableData, TaskItem};

/// Renders `report` (a markdown research report) into a PDF document,
/// returning its bytes. `title` becomes both the PDF's document title and
/// the heading of the first page if the report has no leading `# heading`.
pub fn render_report(report: &str, title: &str) -> Result<Vec<u8>, PdfError> {
    let sources = citations::extract_sources(report);
    let mut content = markdown::parse_markdown(report);
    if content.title.is_none() {
        content.title = Some(title.to_string());
    }
    writer::render(&content, title, &sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_minimal_report_to_pdf_bytes() {
        let report = "# Report\n\nRust is memory safe [1].\n\n## Sources\n\n[1] Example — https://example.com";
        let bytes = render_report(report, "Report").expect("render should succeed");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_a_report_with_no_citations() {
        let bytes = render_report("Just some plain text, nothing special.", "Plain").expect("render should succeed");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
