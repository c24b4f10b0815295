//! Registers a Unicode-capable font from the system, falling back to
//! `printpdf`'s built-in Helvetica. Mirrors the source project's own
//! font-discovery order (DejaVu Sans on Linux, Arial Unicode on macOS,
//! Arial on Windows), translated to `printpdf`'s external-font API.

use std::fs::File;

use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};

use crate::error::PdfError;

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/arialuni.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:/Windows/Fonts/arialbd.ttf",
];

const ITALIC_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Oblique.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Oblique.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Oblique.ttf",
];

/// The three font weights the page layout needs.
pub struct FontSet {
    pub regular: IndirectFontRef,
    pub bold: IndirectFontRef,
    pub italic: IndirectFontRef,
}

fn try_external(doc: &PdfDocumentReference, candidates: &[&str]) -> Option<IndirectFontRef> {
    for path in candidates {
        if !std::path::Path::new(path).exists() {
            continue;
        }
        match File::open(path).and_then(|mut f| doc.add_external_font(&mut f).map_err(std::io::Error::other)) {
            Ok(font) => {
                tracing::info!(path, "registered unicode font");
                return Some(font);
            }
            Err(err) => tracing::warn!(path, error = %err, "failed to register candidate font"),
        }
    }
    None
}

/// Loads the best available regular/bold/italic font triple. Unicode
/// coverage degrades to built-in Helvetica (no non-Latin glyphs) only when
/// no system font is found.
pub fn load_fonts(doc: &PdfDocumentReference) -> Result<FontSet, PdfError> {
    let regular = match try_external(doc, REGULAR_CANDIDATES) {
        Some(font) => font,
        None => doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| PdfError::Font(err.to_string()))?,
    };

    let bold = match try_external(doc, BOLD_CANDIDATES) {
        Some(font) => font,
        None => doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|err| PdfError::Font(err.to_string()))?,
    };

    let italic = match try_external(doc, ITALIC_CANDIDATES) {
        Some(font) => font,
        None => doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(|err| PdfError::Font(err.to_string()))?,
    };

    Ok(FontSet { regular, bold, italic })
}
