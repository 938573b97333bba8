//! Error types for cellscript core.

use thiserror::Error;

/// Errors that stop a conversion. Per-formula and per-graph problems are
/// warnings, not errors; only malformed collaborator input and harness
/// I/O failures surface here.
#[derive(Error, Debug)]
pub enum CellscriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid conversion job: {0}")]
    InvalidJob(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CellscriptError>;
