#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ocrtex::config::Config;
use ocrtex::convert::Converter;
use ocrtex::error::{ConvertError, OcrError};
use ocrtex::ocr::{OcrImage, OcrPage, OcrProvider, OcrResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Config with every path under a fresh temp dir.
pub fn workspace() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default().rooted_at(dir.path());
    std::fs::create_dir_all(&cfg.paths.input_dir).unwrap();
    (dir, cfg)
}

pub fn drop_pdf(cfg: &Config, name: &str) -> PathBuf {
    let p = cfg.paths.input_dir.join(name);
    std::fs::write(&p, format!("%PDF-1.4 {name}")).unwrap();
    p
}

/// Two pages; the first embeds `img-1.jpeg`.
pub fn paper_result() -> OcrResult {
    OcrResult::from_pages(vec![
        OcrPage::new(
            0,
            "# Title\n\n![img-1.jpeg](img-1.jpeg)\n\nSee img-1.jpeg above.",
            vec![OcrImage::new("img-1.jpeg", b64(JPEG_BYTES))],
        ),
        OcrPage::new(1, "Second page text.", vec![]),
    ])
}

/// Answers by file name; anything unscripted is rejected.
#[derive(Default)]
pub struct ScriptedOcr {
    pub results: HashMap<String, OcrResult>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedOcr {
    pub fn with(mut self, file_name: &str, result: OcrResult) -> Self {
        self.results.insert(file_name.to_string(), result);
        self
    }
}

impl OcrProvider for ScriptedOcr {
    fn process(&self, pdf: &Path) -> Result<OcrResult, OcrError> {
        let name = pdf.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.borrow_mut().push(name.clone());
        self.results
            .get(&name)
            .cloned()
            .ok_or_else(|| OcrError::from_status(422, format!("cannot read {name}")))
    }
}

/// Copies the markdown into the output file; fails for paths containing
/// `fail_on`.
#[derive(Default)]
pub struct CopyConverter {
    pub fail_on: Option<String>,
}

impl Converter for CopyConverter {
    fn version(&self) -> Result<String, ConvertError> {
        Ok("copy 1.0".to_string())
    }

    fn convert(
        &self,
        markdown: &Path,
        output: &Path,
        _extra_args: &[String],
    ) -> Result<(), ConvertError> {
        if let Some(pat) = &self.fail_on {
            if markdown.display().to_string().contains(pat.as_str()) {
                return Err(ConvertError::Failed {
                    program: "copy".to_string(),
                    status: "exit status: 64".to_string(),
                    stdout: String::new(),
                    stderr: "unexpected end of input".to_string(),
                });
            }
        }
        let md = std::fs::read_to_string(markdown).unwrap();
        std::fs::write(output, format!("\\documentclass{{article}}\n{md}")).unwrap();
        Ok(())
    }
}
