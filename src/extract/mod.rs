//! Text extraction from uploaded documents.
//!
//! Recognition itself is delegated to an external OCR engine; this module picks the
//! right path for a [`Document`] and normalizes whatever text comes back.

pub mod tesseract;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{Document, DocumentKind};

pub use tesseract::TesseractExtractor;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("{tool} not found. Install it or set its path in the [ocr] config section.")]
    ToolNotFound { tool: &'static str },
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },
    #[error("No text could be extracted from the document")]
    NoText,
}

/// Text recovered from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Page texts joined with single spaces, whitespace-normalized.
    pub text: String,
    pub pages: usize,
}

impl ExtractedText {
    /// Join page texts and normalize whitespace.
    pub fn from_pages<S: AsRef<str>>(pages: &[S]) -> Self {
        let joined = pages
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text: normalize_whitespace(&joined),
            pages: pages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Collapse newlines and whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Turns a document into plain text.
pub trait TextExtractor {
    /// Recognize the text of a rendered document (PDF or image).
    fn recognize(&self, document: &Document) -> Result<ExtractedText, ExtractError>;

    /// Extract text from any supported document.
    ///
    /// Plain text is decoded directly; PDFs and images go through [`recognize`].
    ///
    /// [`recognize`]: TextExtractor::recognize
    fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractError> {
        let extracted = match document.kind {
            DocumentKind::PlainText => {
                let text = String::from_utf8_lossy(&document.bytes);
                ExtractedText::from_pages(&[text])
            }
            DocumentKind::Pdf | DocumentKind::Image(_) => self.recognize(document)?,
        };

        if extracted.is_empty() {
            return Err(ExtractError::NoText);
        }
        log::info!(
            "Extracted {} characters from {} page(s)",
            extracted.text.len(),
            extracted.pages
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ImageFormat;

    struct FixedPages(Vec<&'static str>);

    impl TextExtractor for FixedPages {
        fn recognize(&self, _document: &Document) -> Result<ExtractedText, ExtractError> {
            Ok(ExtractedText::from_pages(&self.0))
        }
    }

    #[test]
    fn normalizes_newlines_and_runs() {
        assert_eq!(
            normalize_whitespace("  Line one\nline\ttwo\r\n\n  three  "),
            "Line one line two three"
        );
        assert_eq!(normalize_whitespace("\n\n"), "");
    }

    #[test]
    fn pages_are_joined_with_spaces() {
        let extracted = ExtractedText::from_pages(&["First page\n", "\nSecond  page"]);
        assert_eq!(extracted.text, "First page Second page");
        assert_eq!(extracted.pages, 2);
    }

    #[test]
    fn plain_text_skips_recognition() {
        let extractor = FixedPages(vec!["should not be used"]);
        let doc = Document::from_text("Pasted\n\ntext.");
        let extracted = extractor.extract(&doc).expect("plain text extracts");
        assert_eq!(extracted.text, "Pasted text.");
        assert_eq!(extracted.pages, 1);
    }

    #[test]
    fn images_go_through_recognition() {
        let extractor = FixedPages(vec!["Scanned words"]);
        let doc = Document {
            bytes: vec![],
            kind: DocumentKind::Image(ImageFormat::Png),
        };
        assert_eq!(extractor.extract(&doc).unwrap().text, "Scanned words");
    }

    #[test]
    fn empty_result_is_an_error() {
        let extractor = FixedPages(vec!["  ", "\n"]);
        let doc = Document {
            bytes: vec![],
            kind: DocumentKind::Pdf,
        };
        assert!(matches!(extractor.extract(&doc), Err(ExtractError::NoText)));
    }
}
