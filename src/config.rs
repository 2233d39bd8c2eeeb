use crate::error::StartupError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub converter: Converter,
    #[serde(default)]
    pub archive: Archive,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Loads `path` when given, else `./ocrtex.toml` when present, else defaults.
    pub fn resolve(user: Option<&Path>) -> Result<Self> {
        if let Some(p) = user {
            return Self::load(p);
        }
        let default = PathBuf::from("ocrtex.toml");
        if default.exists() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }

    /// Rebases every relative path in `[paths]` onto `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let p = &mut self.paths;
        for field in [
            &mut p.input_dir,
            &mut p.done_dir,
            &mut p.ocr_output_dir,
            &mut p.latex_output_dir,
            &mut p.report_file,
        ] {
            if field.is_relative() {
                *field = root.join(&*field);
            }
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub input_dir: PathBuf,
    pub done_dir: PathBuf,
    pub ocr_output_dir: PathBuf,
    pub latex_output_dir: PathBuf,
    pub report_file: PathBuf,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_dir: "pdfs_to_process".into(),
            done_dir: "pdfs-done".into(),
            ocr_output_dir: "ocr_output".into(),
            latex_output_dir: "latex_output".into(),
            report_file: "ocrtex-report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Upload to the files endpoint and hand the OCR call a signed URL.
    SignedUrl,
    /// Embed the PDF in the OCR request as a base64 data URL.
    Inline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub upload_mode: UploadMode,
    pub signed_url_expiry_hours: u32,
    pub request_timeout_seconds: u64,
    pub include_image_base64: bool,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai".into(),
            model: "mistral-ocr-latest".into(),
            api_key_env: "MISTRAL_API_KEY".into(),
            upload_mode: UploadMode::SignedUrl,
            signed_url_expiry_hours: 1,
            request_timeout_seconds: 300,
            include_image_base64: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Converter {
    pub program: String,
    pub from: String,
    pub to: String,
    pub standalone: bool,
    pub extra_args: Vec<String>,
    pub timeout_seconds: u64,
}
impl Default for Converter {
    fn default() -> Self {
        Self {
            program: "pandoc".into(),
            from: "markdown".into(),
            to: "latex".into(),
            standalone: true,
            extra_args: Vec::new(),
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Archive under a timestamp-suffixed name.
    #[default]
    Suffix,
    /// Leave the source in intake and report a warning.
    Skip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Archive {
    pub on_collision: CollisionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_report_json: bool,
    pub markdown_filename: String,
    pub response_filename: String,
    pub images_dirname: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            markdown_filename: "output.md".into(),
            response_filename: "ocr_response.json".into(),
            images_dirname: "images".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "ocrtex.log".into(),
        }
    }
}

/// The OCR provider's API key. Read once at startup and passed explicitly.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_env(var: &str) -> std::result::Result<Self, StartupError> {
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => Ok(Self(v.trim().to_string())),
            _ => Err(StartupError::MissingCredential {
                var: var.to_string(),
            }),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First four characters only, for log lines.
    pub fn redacted(&self) -> String {
        let head: String = self.0.chars().take(4).collect();
        format!("{head}...")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.redacted())
    }
}
