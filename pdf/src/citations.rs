//! Extracts the `[n] Title — URL` entries from a report's `## Sources`
//! section so the page layout can render a footnote table and turn inline
//! `[n]` markers into clickable links, mirroring the source project's
//! citation-linking step in its own PDF exporter.

use std::collections::BTreeMap;

use regex::Regex;

/// One numbered source, as it will appear in the footnote table.
#[derive(Debug, Clone)]
pub struct Source {
    /// The source's display title.
    pub title: String,
    /// The source URL.
    pub url: String,
}

/// Citation number → source, in the order they were declared.
pub type SourceMap = BTreeMap<u32, Source>;

/// Finds the `## Sources` section (if any) and parses its `[n] Title — URL`
/// entries. Falls back to scanning the whole document for the same pattern
/// if no heading is found, so a report without an explicit Sources heading
/// still gets its citations linked.
#[must_use]
pub fn extract_sources(report: &str) -> SourceMap {
    let section_re = Regex::new(r"(?is)##\s*sources\s*\n(.*)").expect("valid regex");
    let entry_re = Regex::new(r"(?m)^\s*\[(\d+)\]\s+(.+?)\s*[—:-]\s*(https?://\S+)\s*$").expect("valid regex");

    let haystack = section_re
        .captures(report)
        .map_or_else(|| report.to_string(), |caps| caps[1].to_string());

    let mut sources = SourceMap::new();
    for caps in entry_re.captures_iter(&haystack) {
        let Ok(num) = caps[1].parse::<u32>() else { continue };
        sources.insert(
            num,
            Source {
                title: caps[2].trim().to_string(),
                url: caps[3].trim_end_matches(['.', ')']).to_string(),
            },
        );
    }
    sources
}

/// A `[n]` citation marker found in a text run, as a byte range into the
/// original string plus the citation number.
#[derive(Debug, Clone, Copy)]
pub struct CitationMark {
    /// Start byte offset of the `[n]` marker.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// The citation number.
    pub number: u32,
}

/// Locates every `[n]` marker in `text`, regardless of whether `n` resolves
/// to a known source (unresolved markers are rendered as plain text).
#[must_use]
pub fn find_citation_marks(text: &str) -> Vec<CitationMark> {
    let marker_re = Regex::new(r"\[(\d+)\]").expect("valid regex");
    marker_re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps[1].parse().ok()?;
            Some(CitationMark {
                start: whole.start(),
                end: whole.end(),
                number,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dash_separated_entries() {
        let report = "Body [1].\n\n## Sources\n\n[1] Example Site — https://example.com/a\n[2] Other — https://example.org/b";
        let sources = extract_sources(report);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[&1].title, "Example Site");
        assert_eq!(sources[&1].url, "https://example.com/a");
        assert_eq!(sources[&2].url, "https://example.org/b");
    }

    #[test]
    fn returns_empty_map_without_a_sources_section() {
        let sources = extract_sources("Just a plain report, no citations.");
        assert!(sources.is_empty());
    }

    #[test]
    fn finds_inline_marks_with_byte_ranges() {
        let marks = find_citation_marks("Rust is memory safe [1] and fast [2].");
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].number, 1);
        assert_eq!(&"Rust is memory safe [1] and fast [2]."[marks[0].start..marks[0].end], "[1]");
    }
}
