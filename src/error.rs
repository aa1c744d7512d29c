//! Error taxonomy shared across the pipeline.
//!
//! Every variant here is recoverable per entry: the reconciliation engine
//! catches them at its boundary and converts them to diagnostics. Only
//! missing top-level configuration is fatal to the process, and that is
//! enforced by clap before any of this code runs.

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Malformed sidecar file or record-source row.
    #[error("parse error: {0}")]
    Parse(String),

    /// No acceptable metadata match, or an identity lookup miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Provider backoff retries exhausted.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// File read/write failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Structured document with a wrong root element or missing title.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport-level provider failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<csv::Error> for SyncError {
    fn from(e: csv::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
