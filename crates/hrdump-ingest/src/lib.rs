//! hrdump ingest library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Exports an applicant-tracking system and a coding-assessment platform into
//! a single JSON snapshot.
//!
//! # Pipeline
//!
//! - **Fetching**: [`fetcher::RateLimitedFetcher`] performs every GET behind a
//!   per-API rate limiter
//! - **Pagination**: [`reader::PaginatedReader`] walks `offset`/`limit` pages
//!   until an empty page
//! - **Schedule**: [`endpoints::Schedule`] is the validated, ordered list of
//!   root fetches, per-item extensions and the application hoist
//! - **Walking**: [`walker::EndpointWalker`] runs a schedule into a
//!   [`document::Document`]
//! - **Assessments**: [`codility::CodilityCollector`] lists and fetches tests
//!   and sessions
//! - **Output**: [`pipeline::run_dump`] anonymizes on request and writes the
//!   snapshot
//!
//! # Example
//!
//! ```no_run
//! use hrdump_ingest::config::DumpConfig;
//! use hrdump_ingest::pipeline::{run_dump, DumpOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DumpConfig::load("creds/config.json")?;
//!     let outcome = run_dump(&config, &DumpOptions::default()).await?;
//!     println!("{}", outcome.path.display());
//!     Ok(())
//! }
//! ```

pub mod assemble;
pub mod auth;
pub mod cli;
pub mod codility;
pub mod config;
pub mod document;
pub mod endpoints;
pub mod error;
pub mod fetcher;
pub mod page;
pub mod pipeline;
pub mod reader;
pub mod retry;
pub mod walker;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use config::DumpConfig;
pub use document::Document;
pub use error::{IngestError, Result};
