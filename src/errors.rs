//! Typed error hierarchy for ltipass.
//!
//! Two top-level enums cover the two subsystems that can fail:
//! - `StoreError`: session store writes and reads
//! - `OutcomeError`: grade reporting back to the LMS
//!
//! The link parser and the resolver have no error type: a URL that does not
//! match and a path with no session are both ordinary `None` results.

use thiserror::Error;

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A launch without one of the identity fields cannot be keyed.
    #[error("Launch parameters are missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Stored launch parameters are not valid JSON: {0}")]
    InvalidParams(#[source] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database task panicked: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Errors from reporting an outcome (grade) to the LMS.
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("No shared secret configured for consumer key '{0}'")]
    UnknownConsumer(String),

    #[error("Launch parameters are missing '{0}', the LMS did not enable grading for this link")]
    MissingParam(&'static str),

    #[error("Score {0} is outside the range 0.0..=1.0")]
    ScoreOutOfRange(f64),

    #[error("Invalid outcome service URL '{url}': {source}")]
    InvalidServiceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to sign outcome request: {0}")]
    Signing(String),

    #[error("Failed to reach outcome service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The LMS answered, but not with success. Carries everything needed to
    /// diagnose a misconfigured consumer on the LMS side.
    #[error("Outcome service rejected the grade (HTTP {status}, {code_major}): {description}")]
    Rejected {
        status: u16,
        code_major: String,
        description: String,
        body: String,
    },
}
