pub mod mistral;
pub mod types;

use crate::error::OcrError;
use std::path::Path;

pub use types::{OcrImage, OcrPage, OcrResult, UsageInfo};

pub trait OcrProvider {
    /// Runs OCR over one PDF. Blocks until the provider answers.
    fn process(&self, pdf: &Path) -> Result<OcrResult, OcrError>;
}

impl<T: OcrProvider + ?Sized> OcrProvider for &T {
    fn process(&self, pdf: &Path) -> Result<OcrResult, OcrError> {
        (**self).process(pdf)
    }
}

/// Content type sent alongside the document bytes.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
