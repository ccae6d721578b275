//! Error types shared across hrdump crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, HrdumpError>;

/// Main error type for the shared utilities
#[derive(Error, Debug)]
pub enum HrdumpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
