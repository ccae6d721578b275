//! Build automation tasks for hrdump
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for hrdump", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<hrdump_ingest::Cli>();

    let content = format!(
        r#"# hrdump CLI Reference

Generated from the CLI source code on {}.

## Overview

`hrdump` exports candidates, recruitments and applications from the
applicant-tracking API plus tests and sessions from the Codility API into one
timestamped JSON snapshot, and anonymizes snapshots after the fact.

## Quick Start

```bash
# Full export using creds/config.json
hrdump dump

# ATS only, into a custom directory, hashed with a salt
hrdump dump --source ats --output-dir ./exports --salt pepper

# Hash personal data of an existing snapshot
hrdump postprocess db_dump.d/db_dump_1700000000000000.json pepper

# Show the endpoint schedule a dump would run
hrdump endpoints
```

## Commands

{}

## Environment Variables

- `HRDUMP_CONFIG` - Config file used when `--config` is not given
- `HRDUMP_HASH_SALT` - Salt for `hrdump dump --salt`
- `HRDUMP_LOG_LEVEL`, `HRDUMP_LOG_OUTPUT`, `HRDUMP_LOG_FORMAT`, `HRDUMP_LOG_DIR`, `HRDUMP_LOG_FILTER` - Logging overrides
- `RUST_LOG` - Additional tracing filter directives

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
