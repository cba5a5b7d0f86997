use std::path::Path;

/// Raster formats the OCR engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
    PlainText,
}

/// An uploaded document: raw bytes plus the detected kind.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl Document {
    /// Detect the kind of `bytes`, using `extension` when the content is not conclusive.
    ///
    /// Returns `None` for binary content that is neither a PDF nor a supported image.
    pub fn from_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Option<Self> {
        let kind = detect_kind(&bytes, extension)?;
        Some(Self { bytes, kind })
    }

    /// Wrap pasted text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            bytes: text.into().into_bytes(),
            kind: DocumentKind::PlainText,
        }
    }

    /// Read a file and detect its kind.
    pub fn open(path: &Path) -> std::io::Result<Option<Self>> {
        let bytes = std::fs::read(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        Ok(Self::from_bytes(bytes, extension))
    }
}

/// Detect a document kind from magic bytes, falling back to the file extension.
pub fn detect_kind(bytes: &[u8], extension: Option<&str>) -> Option<DocumentKind> {
    if let Some(kind) = sniff(bytes) {
        return Some(kind);
    }

    let ext = extension.map(|e| e.trim_start_matches('.').to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Some(DocumentKind::Pdf),
        Some("jpg" | "jpeg") => Some(DocumentKind::Image(ImageFormat::Jpeg)),
        Some("png") => Some(DocumentKind::Image(ImageFormat::Png)),
        Some("bmp") => Some(DocumentKind::Image(ImageFormat::Bmp)),
        Some("tif" | "tiff") => Some(DocumentKind::Image(ImageFormat::Tiff)),
        _ if std::str::from_utf8(bytes).is_ok() => Some(DocumentKind::PlainText),
        _ => None,
    }
}

fn sniff(bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF-") {
        Some(DocumentKind::Pdf)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(DocumentKind::Image(ImageFormat::Jpeg))
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(DocumentKind::Image(ImageFormat::Png))
    } else if bytes.starts_with(b"BM") && bytes.len() > 14 {
        Some(DocumentKind::Image(ImageFormat::Bmp))
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some(DocumentKind::Image(ImageFormat::Tiff))
    } else {
        None
    }
}
