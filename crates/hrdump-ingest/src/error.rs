//! Error types for the export pipeline
//!
//! `Config` and `Auth` errors are fatal and abort a run before (or instead
//! of) fetching. `Http`, `Decode`, `Shape` and transport errors are local to a
//! single page or item fetch: callers log them and carry on with whatever was
//! already collected.

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth2 token could not be acquired or refreshed
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Upstream answered with a non-success status
    #[error("Failed to get {url}: {status}. {body}")]
    Http {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body is not valid JSON
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Decoded page does not carry the expected collection key
    #[error("No \"{key}\" in response from {url}")]
    Shape { url: String, key: String },

    /// Connection, timeout or other transport failure
    #[error("Network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint schedule is inconsistent
    #[error("Invalid endpoint schedule: {0}")]
    Schedule(String),

    /// Bounded retry gave up
    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: Box<IngestError>,
    },

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] hrdump_common::HrdumpError),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }

    /// Whether a later attempt at the same request may succeed.
    ///
    /// Connection failures, timeouts and HTTP 429 are transient; everything
    /// else fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Http { status, .. } => *status == reqwest::StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }

    /// HTTP status of a non-success response, if that is what this is.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}
