use thiserror::Error;

/// Errors raised while turning a report's markdown into a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// A builtin or external font could not be registered with the document.
    #[error("font error: {0}")]
    Font(String),

    /// `printpdf` failed to encode the finished document.
    #[error("pdf encode error: {0}")]
    Encode(String),
}
