//! Page layout: walks [`ContentBlock`]s and lays them out on A4 pages with
//! `printpdf`, the way the teacher's own `PdfWriter` does for its document
//! exports. Citation markers become clickable link annotations pointing at
//! the matching footnote row.

use std::io::{BufWriter, Cursor};

use printpdf::{IndirectFontRef, LinkAnnotation, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Rect};

use crate::citations::{find_citation_marks, SourceMap};
use crate::error::PdfError;
use crate::font::{load_fonts, FontSet};
use crate::markdown::{ContentBlock, ParsedContent, TableData};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;

const MARGIN_LEFT: f32 = 20.0;
const MARGIN_RIGHT: f32 = 20.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 25.0;

const HEADING_SIZES: [f32; 6] = [24.0, 20.0, 16.0, 14.0, 13.0, 12.0];
const BODY_SIZE: f32 = 11.0;
const CODE_SIZE: f32 = 10.0;

const LINE_HEIGHT: f32 = 1.4;

const CONTENT_WIDTH: f32 = PAGE_WIDTH_MM - MARGIN_LEFT - MARGIN_RIGHT;

fn line_height_mm(size_pt: f32) -> f32 {
    (size_pt / 72.0 * 25.4) * LINE_HEIGHT
}

fn char_width_mm(size_pt: f32) -> f32 {
    size_pt / 72.0 * 25.4 * 0.52
}

fn estimate_chars_per_line(size_pt: f32) -> usize {
    let available_width = CONTENT_WIDTH * 0.95;
    ((available_width / char_width_mm(size_pt)) as usize).max(50)
}

/// Word-wraps `text` to `max_chars` per line, breaking overlong words.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut current_line = String::new();

    for word in words {
        if word.len() > max_chars {
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }
            let mut remaining = word;
            while !remaining.is_empty() {
                let chunk_size = max_chars.min(remaining.len());
                let break_at = if chunk_size < remaining.len() { chunk_size.saturating_sub(1) } else { chunk_size };
                let (chunk, rest) = remaining.split_at(break_at);
                if break_at < remaining.len() {
                    lines.push(format!("{chunk}-"));
                } else {
                    current_line = chunk.to_string();
                }
                remaining = rest;
            }
        } else if current_line.len() + word.len() + 1 > max_chars && !current_line.is_empty() {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        } else {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        }
    }
    if !current_line.is_empty() {
        lines.push(current_line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn format_table_cell(text: &str, width: usize) -> String {
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();
    if char_count <= width {
        format!("{trimmed:<width$}")
    } else if width > 2 {
        let truncated: String = trimmed.chars().take(width - 2).collect();
        format!("{truncated}..")
    } else {
        trimmed.chars().take(width).collect()
    }
}

struct PageWriter {
    doc: PdfDocumentReference,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y_position: Mm,
    fonts: FontSet,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, PdfError> {
        let (doc, page_idx, layer_idx) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let fonts = load_fonts(&doc)?;
        Ok(Self {
            doc,
            current_page: page_idx,
            current_layer: layer_idx,
            y_position: Mm(PAGE_HEIGHT_MM - MARGIN_TOP),
            fonts,
        })
    }

    fn ensure_space(&mut self, needed_mm: f32) {
        if self.y_position.0 - needed_mm < MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        let (page_idx, layer_idx) = self.doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.current_page = page_idx;
        self.current_layer = layer_idx;
        self.y_position = Mm(PAGE_HEIGHT_MM - MARGIN_TOP);
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc.get_page(self.current_page).get_layer(self.current_layer)
    }

    /// Writes one line and links any `[n]` markers resolved in `sources` to
    /// that source's URL via an overlaid rectangle annotation.
    fn write_line(&mut self, text: &str, font: &IndirectFontRef, size_pt: f32, sources: &SourceMap) {
        if self.y_position.0 < MARGIN_BOTTOM {
            self.new_page();
        }
        let layer = self.layer();
        layer.use_text(text, size_pt, Mm(MARGIN_LEFT), self.y_position, font);

        let char_w = char_width_mm(size_pt);
        let lh = line_height_mm(size_pt);
        for mark in find_citation_marks(text) {
            if !sources.contains_key(&mark.number) {
                continue;
            }
            let start_chars = text[..mark.start].chars().count() as f32;
            let mark_chars = text[mark.start..mark.end].chars().count() as f32;
            let x0 = MARGIN_LEFT + start_chars * char_w;
            let x1 = x0 + mark_chars * char_w;
            let rect = Rect::new(Mm(x0), self.y_position, Mm(x1), Mm(self.y_position.0 + lh * 0.8));
            let url = sources[&mark.number].url.clone();
            layer.add_link_annotation(LinkAnnotation::new(
                rect,
                None,
                None,
                printpdf::Actions::uri(url),
                None,
            ));
        }

        self.y_position = Mm(self.y_position.0 - lh);
    }

    fn write_wrapped(&mut self, text: &str, font: &IndirectFontRef, size_pt: f32, sources: &SourceMap) {
        let chars_per_line = estimate_chars_per_line(size_pt);
        let lh = line_height_mm(size_pt);
        for line in wrap_text(text, chars_per_line) {
            self.ensure_space(lh);
            self.write_line(&line, font, size_pt, sources);
        }
    }

    fn add_space(&mut self, mm: f32) {
        self.y_position = Mm(self.y_position.0 - mm);
    }

    fn into_bytes(self) -> Result<Vec<u8>, PdfError> {
        let mut writer = BufWriter::new(Cursor::new(Vec::new()));
        self.doc.save(&mut writer).map_err(|err| PdfError::Encode(err.to_string()))?;
        let cursor = writer.into_inner().map_err(|err| PdfError::Encode(err.to_string()))?;
        Ok(cursor.into_inner())
    }
}

fn render_block(writer: &mut PageWriter, block: &ContentBlock, sources: &SourceMap) {
    match block {
        ContentBlock::Heading { level, text } => {
            let size = HEADING_SIZES.get(*level as usize - 1).copied().unwrap_or(12.0);
            let lh = line_height_mm(size);
            if *level > 1 {
                writer.add_space(4.0);
            }
            writer.ensure_space(lh + 4.0);
            let font = writer.fonts.bold.clone();
            writer.write_line(text, &font, size, sources);
            writer.add_space(2.0);
        }
        ContentBlock::Paragraph { text } => {
            let font = writer.fonts.regular.clone();
            writer.write_wrapped(text, &font, BODY_SIZE, sources);
            writer.add_space(3.0);
        }
        ContentBlock::CodeBlock { language, code } => {
            if let Some(lang) = language {
                let font = writer.fonts.italic.clone();
                writer.write_line(&format!("[{lang}]"), &font, CODE_SIZE - 1.0, sources);
            }
            let font = writer.fonts.regular.clone();
            for line in code.lines() {
                writer.ensure_space(line_height_mm(CODE_SIZE));
                writer.write_line(&format!("  {line}"), &font, CODE_SIZE, sources);
            }
            writer.add_space(3.0);
        }
        ContentBlock::UnorderedList { items } => {
            let font = writer.fonts.regular.clone();
            for item in items {
                let trimmed = item.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let chars_per_line = estimate_chars_per_line(BODY_SIZE).saturating_sub(4);
                for (i, line) in wrap_text(trimmed, chars_per_line).iter().enumerate() {
                    writer.ensure_space(line_height_mm(BODY_SIZE));
                    let bullet = if i == 0 { format!("  \u{2022}  {line}") } else { format!("     {line}") };
                    writer.write_line(&bullet, &font, BODY_SIZE, sources);
                }
            }
            writer.add_space(3.0);
        }
        ContentBlock::OrderedList { items, start } => {
            let font = writer.fonts.regular.clone();
            let mut num = *start;
            for item in items {
                let trimmed = item.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let chars_per_line = estimate_chars_per_line(BODY_SIZE).saturating_sub(6);
                for (j, line) in wrap_text(trimmed, chars_per_line).iter().enumerate() {
                    writer.ensure_space(line_height_mm(BODY_SIZE));
                    let numbered = if j == 0 { format!("  {num}.  {line}") } else { format!("      {line}") };
                    writer.write_line(&numbered, &font, BODY_SIZE, sources);
                }
                num += 1;
            }
            writer.add_space(3.0);
        }
        ContentBlock::Blockquote { text } => {
            let font = writer.fonts.italic.clone();
            let chars_per_line = estimate_chars_per_line(BODY_SIZE).saturating_sub(8);
            for line in wrap_text(text, chars_per_line) {
                writer.ensure_space(line_height_mm(BODY_SIZE));
                writer.write_line(&format!("    \"{line}\""), &font, BODY_SIZE, sources);
            }
            writer.add_space(3.0);
        }
        ContentBlock::HorizontalRule => {
            writer.add_space(4.0);
            let font = writer.fonts.regular.clone();
            writer.write_line(&"\u{2500}".repeat(40), &font, BODY_SIZE, sources);
            writer.add_space(4.0);
        }
        ContentBlock::Table(table) => render_table(writer, table, sources),
        ContentBlock::TaskList { items } => {
            let font = writer.fonts.regular.clone();
            for item in items {
                let checkbox = if item.checked { "[x]" } else { "[ ]" };
                writer.ensure_space(line_height_mm(BODY_SIZE));
                writer.write_line(&format!("  {checkbox}  {}", item.text), &font, BODY_SIZE, sources);
            }
            writer.add_space(3.0);
        }
    }
}

fn render_table(writer: &mut PageWriter, table: &TableData, sources: &SourceMap) {
    let lh = line_height_mm(BODY_SIZE);
    let num_cols = table.headers.as_ref().map_or_else(|| table.rows.first().map_or(0, Vec::len), Vec::len);
    if num_cols == 0 {
        writer.add_space(3.0);
        return;
    }

    let mut col_widths = vec![0usize; num_cols];
    if let Some(headers) = &table.headers {
        for (i, h) in headers.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(h.chars().count());
            }
        }
    }
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }
    }

    let total_chars = estimate_chars_per_line(BODY_SIZE);
    let spacing_chars = (num_cols + 1) * 2;
    let available_chars = total_chars.saturating_sub(spacing_chars);
    let total_content_width: usize = col_widths.iter().sum();
    if total_content_width > available_chars && total_content_width > 0 {
        let scale = available_chars as f32 / total_content_width as f32;
        for w in &mut col_widths {
            *w = ((*w as f32 * scale) as usize).max(4);
        }
    }
    for w in &mut col_widths {
        *w = (*w).min(30);
    }

    let table_width: usize = col_widths.iter().sum::<usize>() + spacing_chars;
    let border = "\u{2500}".repeat(table_width.min(80));
    let font_regular = writer.fonts.regular.clone();
    let font_bold = writer.fonts.bold.clone();

    writer.ensure_space(lh);
    writer.write_line(&border, &font_regular, BODY_SIZE, sources);

    if let Some(headers) = &table.headers {
        let mut line = String::new();
        for (i, h) in headers.iter().enumerate() {
            line.push_str("  ");
            line.push_str(&format_table_cell(h, col_widths.get(i).copied().unwrap_or(10)));
        }
        writer.ensure_space(lh);
        writer.write_line(&line, &font_bold, BODY_SIZE, sources);
        writer.ensure_space(lh);
        writer.write_line(&border, &font_regular, BODY_SIZE, sources);
    }

    for row in &table.rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str("  ");
            line.push_str(&format_table_cell(cell, col_widths.get(i).copied().unwrap_or(10)));
        }
        writer.ensure_space(lh);
        writer.write_line(&line, &font_regular, BODY_SIZE, sources);
    }

    writer.ensure_space(lh);
    writer.write_line(&border, &font_regular, BODY_SIZE, sources);
    writer.add_space(3.0);
}

/// Appends the `# Sources` footnote table: `#`, title, URL — one row per
/// citation, sorted by citation number, each URL a clickable link.
fn render_sources_table(writer: &mut PageWriter, sources: &SourceMap) {
    if sources.is_empty() {
        return;
    }
    writer.new_page();
    let font = writer.fonts.bold.clone();
    writer.write_line("Sources", &font, HEADING_SIZES[0], sources);
    writer.add_space(4.0);

    let font_regular = writer.fonts.regular.clone();
    let font_bold = writer.fonts.bold.clone();
    let lh = line_height_mm(BODY_SIZE);

    writer.ensure_space(lh);
    writer.write_line("  #   Title                                   URL", &font_bold, BODY_SIZE, &SourceMap::new());
    writer.ensure_space(lh);
    writer.write_line(&"\u{2500}".repeat(80), &font_regular, BODY_SIZE, &SourceMap::new());

    for (num, source) in sources {
        let title = format_table_cell(&source.title, 38);
        let url = format_table_cell(&source.url, 36);
        writer.ensure_space(lh);
        let text = format!("[{num}] {title} {url}");
        writer.write_line(&text, &font_regular, BODY_SIZE, sources);

        let layer = writer.layer();
        let char_w = char_width_mm(BODY_SIZE);
        let prefix_chars = format!("[{num}] {title} ").chars().count() as f32;
        let url_chars = url.trim_end().chars().count() as f32;
        let x0 = MARGIN_LEFT + prefix_chars * char_w;
        let x1 = x0 + url_chars * char_w;
        let y = Mm(writer.y_position.0 + lh);
        let rect = Rect::new(Mm(x0), y, Mm(x1), Mm(y.0 + lh * 0.8));
        layer.add_link_annotation(LinkAnnotation::new(rect, None, None, printpdf::Actions::uri(source.url.clone()), None));
    }
}

/// Renders `content` into a complete PDF document and returns its bytes.
pub fn render(content: &ParsedContent, title: &str, sources: &SourceMap) -> Result<Vec<u8>, PdfError> {
    let mut writer = PageWriter::new(title)?;
    for block in &content.blocks {
        render_block(&mut writer, block, sources);
    }
    render_sources_table(&mut writer, sources);
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_text_breaks_long_lines() {
        let lines = wrap_text("This is a long line of text that should be wrapped at the specified width", 30);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 35);
        }
    }

    #[test]
    fn format_table_cell_pads_and_truncates() {
        assert_eq!(format_table_cell("hi", 5), "hi   ");
        assert_eq!(format_table_cell("abcdefgh", 5), "abc..");
    }
}
