//! Error types for the batch pipeline.
//!
//! Startup errors are fatal: the batch never begins. Everything else is
//! per-document and ends up in the batch report via [`PipelineError`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the process before any document is touched.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(
        "{var} is not set. Export it or add it to a .env file \
         (keys: https://console.mistral.ai/api-keys)"
    )]
    MissingCredential { var: String },

    #[error("converter '{program}' is not available: {detail}\nInstall pandoc: https://pandoc.org/installing.html")]
    ConverterUnavailable { program: String, detail: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("cannot read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("authentication rejected ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("rate limit or quota exceeded ({status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("provider rejected the document ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("provider server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed OCR response: {0}")]
    MalformedResponse(String),
}

impl OcrError {
    /// Maps a non-success HTTP status onto the failure it represents.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => OcrError::Auth { status, body },
            402 | 429 => OcrError::RateLimited { status, body },
            500..=599 => OcrError::Server { status, body },
            _ => OcrError::Rejected { status, body },
        }
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image '{id}' has no embedded payload")]
    MissingPayload { id: String },

    #[error("image '{id}' is not valid base64: {source}")]
    Decode {
        id: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("image ids '{first}' and '{second}' both map to file '{filename}'")]
    FilenameCollision {
        first: String,
        second: String,
        filename: String,
    },

    #[error("markdown references image '{target}' which was not staged")]
    DanglingReference { target: String },

    #[error("failed to serialize OCR response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MaterializeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MaterializeError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    Failed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("'{program}' exceeded timeout ({secs}s)\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    TimedOut {
        program: String,
        secs: u64,
        stdout: String,
        stderr: String,
    },

    #[error("converter reported success but '{path}' was not written")]
    MissingOutput { path: PathBuf },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to move '{from}' to '{to}': {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot prepare archive directory '{path}': {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A per-document failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    OcrFailure,
    MaterializationFailure,
    ConversionFailure,
    ArchiveFailure,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Ocr(_) => ErrorKind::OcrFailure,
            PipelineError::Materialize(_) => ErrorKind::MaterializationFailure,
            PipelineError::Convert(_) => ErrorKind::ConversionFailure,
            PipelineError::Archive(_) => ErrorKind::ArchiveFailure,
        }
    }
}
