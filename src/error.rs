use std::path::PathBuf;
use thiserror::Error;

/// Result type for all media operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("no duration reported for {0}")]
    MissingDuration(PathBuf),

    #[error("could not preserve the audio track in the output")]
    AudioLost,

    #[error("everything is silent, nothing left to keep")]
    NothingToKeep,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode ffprobe output: {0}")]
    ProbeDecode(#[from] serde_json::Error),
}
