use crate::error::OcrError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrImage {
    /// Provider-assigned identifier. Opaque: not guaranteed filename-safe.
    pub id: String,
    /// Plain base64 or a `data:<mime>;base64,` URL.
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl OcrImage {
    pub fn new(id: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_base64: Some(image_base64.into()),
        }
    }

    /// MIME type declared by a data URL payload, if any.
    pub fn content_type(&self) -> Option<&str> {
        let rest = self.image_base64.as_deref()?.strip_prefix("data:")?;
        let (meta, _) = rest.split_once(',')?;
        let mime = meta.split(';').next()?.trim();
        (!mime.is_empty()).then_some(mime)
    }

    /// The base64 body with any data URL header stripped.
    pub fn base64_body(&self) -> Option<&str> {
        let raw = self.image_base64.as_deref()?;
        if raw.starts_with("data:") {
            raw.split_once(',').map(|(_, body)| body)
        } else {
            Some(raw)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: u32,
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<OcrImage>,
}

impl OcrPage {
    pub fn new(index: u32, markdown: impl Into<String>, images: Vec<OcrImage>) -> Self {
        Self {
            index,
            markdown: markdown.into(),
            images,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub pages_processed: Option<u64>,
    #[serde(default)]
    pub doc_size_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResponseShape {
    pages: Vec<OcrPage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage_info: Option<UsageInfo>,
}

/// A validated OCR response. `raw` keeps the body exactly as received.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub pages: Vec<OcrPage>,
    pub model: Option<String>,
    pub usage: Option<UsageInfo>,
    pub raw: serde_json::Value,
}

impl OcrResult {
    pub fn from_json(raw: serde_json::Value) -> Result<Self, OcrError> {
        let shape: ResponseShape = serde_json::from_value(raw.clone())
            .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
        if shape.pages.is_empty() {
            return Err(OcrError::MalformedResponse(
                "response contains no pages".to_string(),
            ));
        }
        let mut pages = shape.pages;
        pages.sort_by_key(|p| p.index);
        Ok(Self {
            pages,
            model: shape.model,
            usage: shape.usage_info,
            raw,
        })
    }

    /// Builds a result from already-typed pages; `raw` is their serialization.
    pub fn from_pages(pages: Vec<OcrPage>) -> Self {
        let shape = ResponseShape {
            pages,
            model: None,
            usage_info: None,
        };
        let raw = serde_json::to_value(&shape).unwrap_or(serde_json::Value::Null);
        Self {
            pages: shape.pages,
            model: None,
            usage: None,
            raw,
        }
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }
}
