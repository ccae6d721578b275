//! hrdump common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the hrdump workspace.
//!
//! - **Error Handling**: [`HrdumpError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Anonymization**: salted hashing of personally identifying fields
//! - **Snapshots**: sorted, indented JSON files named by timestamp
//! - **Types**: shared enums such as [`types::HashAlgorithm`]

pub mod anonymize;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use error::{HrdumpError, Result};
