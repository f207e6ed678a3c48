//! Error taxonomy for the pipeline.
//!
//! Every stage surfaces its failures through [`PipelineError`]. Whether a
//! given error is fatal to the run is decided by the stage that observes it,
//! not by the error itself.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("fetch failed for {category}: {reason}")]
    Fetch { category: String, reason: String },

    #[error("summarize failed: {0}")]
    Summarize(String),

    #[error("page session error: {0}")]
    Session(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("upload rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("persist failed: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Whether another attempt could succeed.
    ///
    /// Configuration mistakes, malformed local data and client errors other
    /// than 408 and 429 won't fix themselves.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Config(_) | PipelineError::Json(_) | PipelineError::Spawn { .. } => false,
            PipelineError::Rejected { status, .. } => {
                !(400..500).contains(status) || matches!(*status, 408 | 429)
            }
            _ => true,
        }
    }
}
