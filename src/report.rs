use crate::document::Stage;
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub started: String,
    pub finished: String,
    pub succeeded: usize,
    pub failed: usize,
    /// Left in intake because their archive name is taken.
    pub skipped: usize,
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<FailureReport>,
    pub warnings: Vec<WarningReport>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: String,
    pub base_name: String,
    pub input_sha256: Option<String>,
    pub pages: usize,
    pub images: usize,
    pub markdown: PathBuf,
    pub tex: PathBuf,
    /// `None` when the archive move was skipped.
    pub archived_as: Option<PathBuf>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub document: String,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningReport {
    pub document: String,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    ArchiveCollision,
    /// Another document in the same batch already claimed the base name.
    DuplicateBaseName,
}
