//! Mistral OCR client.
//!
//! Two submission modes: upload the PDF to the files API and pass the OCR
//! endpoint a signed URL, or inline the PDF as a base64 data URL.

use super::{OcrProvider, OcrResult, content_type_for};
use crate::config::{Config, Credential, UploadMode};
use crate::error::{OcrError, StartupError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::{Client, Response, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub struct MistralOcr {
    client: Client,
    base_url: String,
    model: String,
    api_key: Credential,
    upload_mode: UploadMode,
    expiry_hours: u32,
    include_image_base64: bool,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

impl MistralOcr {
    pub fn new(cfg: &Config, api_key: Credential) -> Result<Self, StartupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.ocr.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.ocr.base_url.trim_end_matches('/').to_string(),
            model: cfg.ocr.model.clone(),
            api_key,
            upload_mode: cfg.ocr.upload_mode,
            expiry_hours: cfg.ocr.signed_url_expiry_hours,
            include_image_base64: cfg.ocr.include_image_base64,
        })
    }

    fn upload(&self, file_name: &str, mime: &str, bytes: Vec<u8>) -> Result<String, OcrError> {
        let url = format!("{}/v1/files", self.base_url);
        debug!("POST {url} file={file_name} bytes={}", bytes.len());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .multipart(form)
            .send()?;
        let uploaded: UploadedFile = read_json(check(resp)?)?;
        Ok(uploaded.id)
    }

    fn signed_url(&self, file_id: &str) -> Result<String, OcrError> {
        let url = format!(
            "{}/v1/files/{}/url?expiry={}",
            self.base_url, file_id, self.expiry_hours
        );
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .send()?;
        let signed: SignedUrl = read_json(check(resp)?)?;
        Ok(signed.url)
    }

    fn run_ocr(&self, document_url: String) -> Result<OcrResult, OcrError> {
        let url = format!("{}/v1/ocr", self.base_url);
        debug!("POST {url} model={}", self.model);
        let body = serde_json::json!({
            "model": self.model,
            "document": {
                "type": "document_url",
                "document_url": document_url,
            },
            "include_image_base64": self.include_image_base64,
        });
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()?;
        let raw: serde_json::Value = read_json(check(resp)?)?;
        OcrResult::from_json(raw)
    }
}

impl OcrProvider for MistralOcr {
    fn process(&self, pdf: &Path) -> Result<OcrResult, OcrError> {
        let bytes = std::fs::read(pdf).map_err(|source| OcrError::ReadInput {
            path: pdf.to_path_buf(),
            source,
        })?;
        let mime = content_type_for(pdf);
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let document_url = match self.upload_mode {
            UploadMode::SignedUrl => {
                let file_id = self.upload(&file_name, mime, bytes)?;
                self.signed_url(&file_id)?
            }
            UploadMode::Inline => format!("data:{mime};base64,{}", STANDARD.encode(&bytes)),
        };

        let result = self.run_ocr(document_url)?;
        info!(
            "ocr {} pages={} images={} model={}",
            file_name,
            result.pages.len(),
            result.image_count(),
            result.model.as_deref().unwrap_or("?")
        );
        Ok(result)
    }
}

fn check(resp: Response) -> Result<Response, OcrError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(OcrError::from_status(status.as_u16(), body))
}

fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, OcrError> {
    let text = resp.text()?;
    serde_json::from_str(&text).map_err(|e| OcrError::MalformedResponse(e.to_string()))
}
