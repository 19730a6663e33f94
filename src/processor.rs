use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::debug;

use crate::{config::OcrConfig, docx, ocr, ocr::OcrError, pdf, spreadsheet};

/// Extensions accepted by `/upload`, lowercase, without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "xls", "xlsx", "docx"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported document type: {0:?}")]
    Unsupported(String),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("PDF is password protected")]
    Encrypted,
    #[error("failed to read word-processor document: {0}")]
    WordProcessor(String),
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The extraction strategy chosen for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
    Spreadsheet,
    WordProcessor,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Result<Self, ExtractError> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" => Ok(DocumentKind::Image),
            "pdf" => Ok(DocumentKind::Pdf),
            "xls" | "xlsx" => Ok(DocumentKind::Spreadsheet),
            "docx" => Ok(DocumentKind::WordProcessor),
            other => Err(ExtractError::Unsupported(other.to_string())),
        }
    }

    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        let extension = extension(file_name)
            .ok_or_else(|| ExtractError::Unsupported(file_name.to_string()))?;
        Self::from_extension(&extension)
    }
}

/// Lowercased suffix after the last `.`, if the name has one.
pub fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, suffix)| suffix.to_ascii_lowercase())
}

pub fn is_allowed_file(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Extracts the text of a document already stored at `path`.
///
/// Blocks for the full duration of the parse or OCR run; callers on an
/// async executor should go through `web::block`.
pub fn extract_file(kind: DocumentKind, path: &Path, ocr: &OcrConfig) -> Result<String, ExtractError> {
    debug!(?kind, path = %path.display(), "Dispatching extraction");
    match kind {
        DocumentKind::Image => {
            // Camera exports often carry the wrong suffix, so sniff the bytes.
            let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
            Ok(ocr::recognize(&image, ocr)?)
        }
        DocumentKind::Pdf => pdf::extract_text(path),
        DocumentKind::Spreadsheet => spreadsheet::extract_text(path),
        DocumentKind::WordProcessor => docx::extract_text(path),
    }
}

/// OCR for an encoded image held in memory (camera captures).
pub fn recognize_image_bytes(bytes: &[u8], ocr: &OcrConfig) -> Result<String, ExtractError> {
    let image = image::load_from_memory(bytes)?;
    Ok(ocr::recognize(&image, ocr)?)
}
