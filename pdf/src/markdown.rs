//! Parses a report's markdown into structured blocks a PDF page layout
//! can walk linearly, the way the teacher's document-export pipeline does
//! for its own PDF/DOCX/XLSX writers.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// A row of table data.
pub type TableRow = Vec<String>;

/// Table data extracted from markdown.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    /// Header row, if the table had one.
    pub headers: Option<TableRow>,
    /// Data rows.
    pub rows: Vec<TableRow>,
}

/// One task-list item.
#[derive(Debug, Clone)]
pub struct TaskItem {
    /// Whether the item's checkbox was checked.
    pub checked: bool,
    /// The item's text.
    pub text: String,
}

/// A single unit of report content, in document order.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    /// A heading (h1-h6).
    Heading { level: u8, text: String },
    /// A paragraph of text, possibly carrying `[n]` citation markers.
    Paragraph { text: String },
    /// A fenced or indented code block.
    CodeBlock { language: Option<String>, code: String },
    /// A bulleted list.
    UnorderedList { items: Vec<String> },
    /// A numbered list.
    OrderedList { items: Vec<String>, start: u64 },
    /// A blockquote.
    Blockquote { text: String },
    /// A horizontal rule.
    HorizontalRule,
    /// A table.
    Table(TableData),
    /// A task list.
    TaskList { items: Vec<TaskItem> },
}

/// A parsed report, ready for page layout.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    /// The document's first h1, if any.
    pub title: Option<String>,
    /// Content blocks in document order.
    pub blocks: Vec<ContentBlock>,
}

/// Parses markdown content into [`ContentBlock`]s.
#[must_use]
pub fn parse_markdown(content: &str) -> ParsedContent {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(content, options);

    let mut result = ParsedContent::default();
    let mut current_text = String::new();
    let mut list_items: Vec<String> = Vec::new();
    let mut task_items: Vec<TaskItem> = Vec::new();
    let mut is_ordered_list = false;
    let mut list_start: u64 = 1;
    let mut in_list_item = false;
    let mut heading_level: u8 = 1;
    let mut in_blockquote = false;
    let mut in_code_block = false;
    let mut code_language: Option<String> = None;
    let mut code_content = String::new();

    let mut in_table = false;
    let mut in_table_head = false;
    let mut current_table = TableData::default();
    let mut current_table_row: TableRow = Vec::new();
    let mut current_cell_text = String::new();

    let mut current_task_checked = false;
    let mut in_task_list = false;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading_level = match level {
                    HeadingLevel::H1 => 1,
                    HeadingLevel::H2 => 2,
                    HeadingLevel::H3 => 3,
                    HeadingLevel::H4 => 4,
                    HeadingLevel::H5 => 5,
                    HeadingLevel::H6 => 6,
                };
                current_text.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                if !current_text.is_empty() {
                    if heading_level == 1 && result.title.is_none() {
                        result.title = Some(current_text.clone());
                    }
                    result.blocks.push(ContentBlock::Heading {
                        level: heading_level,
                        text: current_text.trim().to_string(),
                    });
                }
                current_text.clear();
            }

            Event::Start(Tag::Paragraph) => {
                if !in_list_item && !in_blockquote {
                    current_text.clear();
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if !in_list_item && !in_blockquote && !current_text.is_empty() {
                    result.blocks.push(ContentBlock::Paragraph {
                        text: current_text.trim().to_string(),
                    });
                    current_text.clear();
                }
            }

            Event::Start(Tag::List(start)) => {
                is_ordered_list = start.is_some();
                list_start = start.unwrap_or(1);
                list_items.clear();
                task_items.clear();
                in_task_list = false;
            }
            Event::End(TagEnd::List(_)) => {
                if in_task_list && !task_items.is_empty() {
                    result.blocks.push(ContentBlock::TaskList { items: task_items.clone() });
                } else if !list_items.is_empty() {
                    if is_ordered_list {
                        result.blocks.push(ContentBlock::OrderedList {
                            items: list_items.clone(),
                            start: list_start,
                        });
                    } else {
                        result.blocks.push(ContentBlock::UnorderedList { items: list_items.clone() });
                    }
                }
                list_items.clear();
                task_items.clear();
            }
            Event::Start(Tag::Item) => {
                in_list_item = true;
                current_text.clear();
            }
            Event::End(TagEnd::Item) => {
                if in_task_list {
                    task_items.push(TaskItem {
                        checked: current_task_checked,
                        text: current_text.trim().to_string(),
                    });
                } else {
                    list_items.push(current_text.trim().to_string());
                }
                in_list_item = false;
                current_text.clear();
            }

            Event::TaskListMarker(checked) => {
                in_task_list = true;
                current_task_checked = checked;
            }

            Event::Start(Tag::BlockQuote(_)) => {
                in_blockquote = true;
                current_text.clear();
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                if !current_text.is_empty() {
                    result.blocks.push(ContentBlock::Blockquote { text: current_text.trim().to_string() });
                }
                in_blockquote = false;
                current_text.clear();
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_content.clear();
                code_language = match kind {
                    pulldown_cmark::CodeBlockKind::Fenced(lang) => {
                        let l = lang.to_string();
                        if l.is_empty() { None } else { Some(l) }
                    }
                    pulldown_cmark::CodeBlockKind::Indented => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                result.blocks.push(ContentBlock::CodeBlock {
                    language: code_language.take(),
                    code: code_content.trim_end().to_string(),
                });
                in_code_block = false;
                code_content.clear();
            }

            Event::Start(Tag::Table(_)) => {
                in_table = true;
                current_table = TableData::default();
            }
            Event::End(TagEnd::Table) => {
                if current_table.headers.is_some() || !current_table.rows.is_empty() {
                    result.blocks.push(ContentBlock::Table(current_table.clone()));
                }
                in_table = false;
                current_table = TableData::default();
            }
            Event::Start(Tag::TableHead) => {
                in_table_head = true;
                current_table_row.clear();
            }
            Event::End(TagEnd::TableHead) => {
                if !current_table_row.is_empty() {
                    current_table.headers = Some(current_table_row.clone());
                }
                in_table_head = false;
                current_table_row.clear();
            }
            Event::Start(Tag::TableRow) => current_table_row.clear(),
            Event::End(TagEnd::TableRow) => {
                if !in_table_head && !current_table_row.is_empty() {
                    current_table.rows.push(current_table_row.clone());
                }
                current_table_row.clear();
            }
            Event::Start(Tag::TableCell) => current_cell_text.clear(),
            Event::End(TagEnd::TableCell) => {
                current_table_row.push(current_cell_text.trim().to_string());
                current_cell_text.clear();
            }

            Event::Rule => result.blocks.push(ContentBlock::HorizontalRule),

            Event::Text(text) => {
                if in_code_block {
                    code_content.push_str(&text);
                } else if in_table {
                    current_cell_text.push_str(&text);
                } else {
                    current_text.push_str(&text);
                }
            }
            Event::Code(code) => {
                current_text.push('`');
                current_text.push_str(&code);
                current_text.push('`');
            }
            Event::SoftBreak | Event::HardBreak => {
                if in_code_block {
                    code_content.push('\n');
                } else if !in_table {
                    current_text.push(' ');
                }
            }

            _ => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_from_first_h1() {
        let parsed = parse_markdown("# Report Title\n\nBody text.");
        assert_eq!(parsed.title.as_deref(), Some("Report Title"));
    }

    #[test]
    fn keeps_citation_markers_in_paragraph_text() {
        let parsed = parse_markdown("Rust is memory safe [1].");
        match &parsed.blocks[0] {
            ContentBlock::Paragraph { text } => assert!(text.contains("[1]")),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn parses_sources_table_shaped_list() {
        let parsed = parse_markdown("## Sources\n\n[1] Example — https://example.com");
        assert!(parsed
            .blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::Heading { text, .. } if text == "Sources")));
    }
}
