use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{ExtractError, ExtractedText, TextExtractor};
use crate::config::OcrConfig;
use crate::document::{Document, DocumentKind};

/// OCR through the `tesseract` CLI, with PDFs rendered by `pdftoppm` (poppler-utils).
///
/// # System Requirements
///
/// - **Linux**: `sudo apt-get install tesseract-ocr poppler-utils`
/// - **macOS**: `brew install tesseract poppler`
/// - **Windows**: <https://github.com/UB-Mannheim/tesseract/wiki>
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    tesseract: PathBuf,
    pdftoppm: PathBuf,
    dpi: u32,
    languages: String,
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new(&OcrConfig::default())
    }
}

impl TesseractExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tesseract: config
                .tesseract_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("tesseract")),
            pdftoppm: config
                .pdftoppm_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("pdftoppm")),
            dpi: config.pdf_dpi,
            languages: config.languages.join("+"),
        }
    }

    /// True if the tesseract binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.tesseract).arg("--version").output().is_ok()
    }

    fn ocr_image(&self, image: &Path) -> Result<String, ExtractError> {
        let output = run(
            "tesseract",
            Command::new(&self.tesseract)
                .arg(image)
                .arg("stdout")
                .args(["-l", self.languages.as_str()]),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Render every page of a PDF to PNG and return the page images in order.
    fn render_pdf(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        run(
            "pdftoppm",
            Command::new(&self.pdftoppm)
                .args(["-r", self.dpi.to_string().as_str(), "-png"])
                .arg(pdf)
                .arg(out_dir.join("page")),
        )?;

        // pdftoppm zero-pads page numbers, so lexical order is page order.
        let mut pages: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("png")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("page"))
            })
            .collect();
        pages.sort();
        Ok(pages)
    }
}

impl TextExtractor for TesseractExtractor {
    fn recognize(&self, document: &Document) -> Result<ExtractedText, ExtractError> {
        let work_dir = tempfile::tempdir()?;

        match document.kind {
            DocumentKind::Image(format) => {
                let image = work_dir.path().join(format!("input.{}", format.extension()));
                std::fs::write(&image, &document.bytes)?;
                let text = self.ocr_image(&image)?;
                log::info!("Extracted text from image");
                Ok(ExtractedText::from_pages(&[text]))
            }
            DocumentKind::Pdf => {
                let pdf = work_dir.path().join("input.pdf");
                std::fs::write(&pdf, &document.bytes)?;
                let pages = self.render_pdf(&pdf, work_dir.path())?;
                log::info!("Rendered {} PDF page(s) at {} dpi", pages.len(), self.dpi);

                let mut texts = Vec::with_capacity(pages.len());
                for (i, page) in pages.iter().enumerate() {
                    texts.push(self.ocr_image(page)?);
                    log::debug!("Extracted text from page {}", i + 1);
                }
                Ok(ExtractedText::from_pages(&texts))
            }
            DocumentKind::PlainText => Err(ExtractError::UnsupportedFormat(
                "plain text has nothing to recognize".to_string(),
            )),
        }
    }
}

fn run(tool: &'static str, command: &mut Command) -> Result<Output, ExtractError> {
    let output = command.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::ToolNotFound { tool }
        } else {
            ExtractError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::ToolFailed {
            tool,
            message: format!("exited with code {:?}: {}", output.status.code(), stderr.trim()),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ImageFormat;

    #[test]
    fn languages_are_joined_for_tesseract() {
        let config = OcrConfig {
            languages: vec!["eng".into(), "deu".into()],
            pdf_dpi: 300,
            ..Default::default()
        };
        let extractor = TesseractExtractor::new(&config);
        assert_eq!(extractor.languages, "eng+deu");
        assert_eq!(extractor.dpi, 300);
        assert_eq!(extractor.tesseract, PathBuf::from("tesseract"));
    }

    #[test]
    fn missing_binary_is_reported() {
        let config = OcrConfig {
            tesseract_path: Some(PathBuf::from("/nonexistent/tesseract-binary")),
            ..Default::default()
        };
        let extractor = TesseractExtractor::new(&config);
        assert!(!extractor.is_available());

        let doc = Document {
            bytes: b"\x89PNG\r\n\x1a\n".to_vec(),
            kind: DocumentKind::Image(ImageFormat::Png),
        };
        assert!(matches!(
            extractor.extract(&doc),
            Err(ExtractError::ToolNotFound { tool: "tesseract" })
        ));
    }

    #[test]
    fn missing_pdf_renderer_is_reported() {
        let config = OcrConfig {
            pdftoppm_path: Some(PathBuf::from("/nonexistent/pdftoppm-binary")),
            ..Default::default()
        };
        let extractor = TesseractExtractor::new(&config);
        let doc = Document {
            bytes: b"%PDF-1.4\n".to_vec(),
            kind: DocumentKind::Pdf,
        };
        assert!(matches!(
            extractor.extract(&doc),
            Err(ExtractError::ToolNotFound { tool: "pdftoppm" })
        ));
    }
}
