use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KonspektError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    Configuration { env_var: String },

    #[error("The transcript is empty. The recording may be silent or unsupported.")]
    EmptyTranscript,

    #[error("Could not parse the structured response: {reason}")]
    MalformedResponse { reason: String },

    #[error("{cause}")]
    Remote { cause: String },

    #[error("Export to {path} failed: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("History persistence failed: {reason}")]
    Persistence { reason: String },

    #[error("A run is already in progress")]
    Busy,

    #[error("No media has been loaded yet")]
    NotReady,

    #[error("The last failure cannot be retried; load a different file")]
    NotRetryable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for KonspektError {
    fn from(err: reqwest::Error) -> Self {
        KonspektError::Remote {
            cause: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KonspektError>;
