//! Command-line interface definition

use crate::pipeline::{Source, DEFAULT_SNAPSHOT_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hrdump - HR data export
#[derive(Parser, Debug)]
#[command(name = "hrdump")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the CLI reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export ATS and Codility data into a JSON snapshot
    Dump {
        /// Config file (defaults to $HRDUMP_CONFIG, then creds/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory receiving the snapshot (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Snapshot file name prefix
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT_NAME)]
        name: String,

        /// Which APIs to export
        #[arg(short, long, value_enum, default_value_t = Source::All)]
        source: Source,

        /// Anonymize the snapshot with this salt
        #[arg(long, env = "HRDUMP_HASH_SALT")]
        salt: Option<String>,

        /// Anonymize the snapshot even without a salt
        #[arg(long)]
        anonymize: bool,
    },

    /// Hash sensitive fields of a snapshot into <FILE>.processed.json
    Postprocess {
        /// Snapshot to process
        file: PathBuf,

        /// Salt appended to every hashed value
        salt: Option<String>,

        /// Hash algorithm: sha1, sha256, sha512 or md5
        #[arg(short, long, default_value = "sha1")]
        algorithm: String,
    },

    /// Print the validated endpoint schedule
    Endpoints {
        /// Config file (defaults to $HRDUMP_CONFIG, then creds/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
