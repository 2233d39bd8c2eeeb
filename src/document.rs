use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocState {
    Pending,
    OcrRunning,
    OcrDone,
    Materializing,
    MaterializeDone,
    LatexRunning,
    LatexDone,
    Archived,
    Failed,
}

impl DocState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocState::Archived | DocState::Failed)
    }

    /// The only legal successor on the happy path.
    fn next(self) -> Option<DocState> {
        use DocState::*;
        match self {
            Pending => Some(OcrRunning),
            OcrRunning => Some(OcrDone),
            OcrDone => Some(Materializing),
            Materializing => Some(MaterializeDone),
            MaterializeDone => Some(LatexRunning),
            LatexRunning => Some(LatexDone),
            LatexDone => Some(Archived),
            Archived | Failed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    Materialize,
    Latex,
    Archive,
}

impl Stage {
    /// Which stage was active when a document sat in `state`.
    pub fn of(state: DocState) -> Stage {
        use DocState::*;
        match state {
            Pending | OcrRunning | OcrDone => Stage::Ocr,
            Materializing | MaterializeDone => Stage::Materialize,
            LatexRunning => Stage::Latex,
            LatexDone | Archived | Failed => Stage::Archive,
        }
    }
}

/// One input PDF. `base_name` is derived once and keys every output tree.
#[derive(Debug, Clone)]
pub struct Document {
    source: PathBuf,
    base_name: String,
    state: DocState,
}

impl Document {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let base_name = base_name_of(&source);
        Self {
            source,
            base_name,
            state: DocState::Pending,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.base_name.clone())
    }

    pub fn state(&self) -> DocState {
        self.state
    }

    /// Moves one step along the happy path. Terminal states stay put.
    pub fn advance(&mut self) -> DocState {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
        self.state
    }

    /// Marks the document failed and returns the stage that was running.
    pub fn fail(&mut self) -> Stage {
        let stage = Stage::of(self.state);
        self.state = DocState::Failed;
        stage
    }
}

fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
