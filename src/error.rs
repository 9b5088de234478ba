use crate::session::AbSlot;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between a speech request and the audio it produces.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{program} is not installed or not on PATH")]
    Unavailable { program: String },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}{}", fmt_stderr(.stderr))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} finished but did not write {}", .path.display())]
    MissingOutput { program: String, path: PathBuf },

    #[error("speech was cancelled")]
    Cancelled,

    #[error("{0} is still busy with a previous request")]
    Busy(String),

    #[error("speech worker for {0} has shut down")]
    WorkerStopped(String),

    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("no engine selected")]
    NoEngineSelected,

    #[error("no favorite named '{0}'")]
    UnknownFavorite(String),

    #[error("A/B slot {0} has no engine assigned")]
    AbSlotEmpty(AbSlot),

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    #[error("audio playback failed: {0}")]
    Playback(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn fmt_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
