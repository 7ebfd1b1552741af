//! Error taxonomy for a reconciliation pass.

use crate::domain::SeriesId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that can abort a reconciliation pass or a single authenticated
/// call.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The access token was rejected and the refresh grant failed. Initial
    /// authorization has to be re-run out of band.
    #[error("Access token expired and refresh failed: {0}")]
    AuthExpired(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("No stored credentials at {0}")]
    CredentialsNotFound(PathBuf),

    #[error("Failed to persist credentials: {0}")]
    CredentialWrite(String),

    /// Only produced when a caller chooses to propagate an oracle failure;
    /// the reconciliation engine degrades the entry instead.
    #[error("Airing data unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),
}

impl TrackerError {
    /// Builds a transport error from a non-success HTTP status.
    pub fn status(status: reqwest::StatusCode, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        if body.is_empty() {
            Self::Transport(format!("HTTP {status}"))
        } else {
            Self::Transport(format!("HTTP {status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Why the airing oracle could not answer for one series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("AniList transport error: {0}")]
    Transport(String),

    #[error("AniList has no entry for series {0}")]
    NotFound(SeriesId),

    #[error("AniList payload malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
