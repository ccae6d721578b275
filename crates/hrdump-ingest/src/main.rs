//! hrdump - HR data export

use clap::Parser;
use hrdump_common::logging::{init_logging, LogConfig, LogLevel};
use hrdump_common::types::HashAlgorithm;
use hrdump_ingest::endpoints::Step;
use hrdump_ingest::pipeline::{effective_schedule, postprocess, run_dump, DumpOptions};
use hrdump_ingest::{Cli, Commands, DumpConfig};
use std::path::Path;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    if let Err(e) = execute(command, cli.verbose).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Logging from the config's `debug`/`http_debug`; environment wins.
fn setup_logging(debug: bool, http_debug: bool) {
    let log_config = LogConfig::for_run(debug, http_debug);
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    // The export still works without logging.
    let _ = init_logging(&log_config);
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DumpConfig> {
    let path = DumpConfig::resolve_path(path);
    Ok(DumpConfig::load(path)?)
}

async fn execute(command: Commands, verbose: bool) -> anyhow::Result<()> {
    match command {
        Commands::Dump {
            config,
            output_dir,
            name,
            source,
            salt,
            anonymize,
        } => {
            let config = load_config(config.as_deref())?;
            setup_logging(config.debug || verbose, config.http_debug);

            let options = DumpOptions {
                source,
                name,
                output_dir,
                salt,
                anonymize,
            };
            let outcome = run_dump(&config, &options).await?;
            println!("{}", outcome.path.display());
        },
        Commands::Postprocess {
            file,
            salt,
            algorithm,
        } => {
            setup_logging(verbose, false);
            let algorithm = HashAlgorithm::from_name_or_default(&algorithm);
            let output = postprocess(&file, salt, algorithm)?;
            info!(path = %output.display(), "Post-processing complete");
            println!("{}", output.display());
        },
        Commands::Endpoints { config } => {
            let config = load_config(config.as_deref())?;
            let level = if verbose { LogLevel::Debug } else { LogLevel::Warn };
            let _ = init_logging(&LogConfig::builder().level(level).build());

            for (index, step) in effective_schedule(&config)?.steps().iter().enumerate() {
                let marker = match step {
                    Step::Root { .. } => "root",
                    Step::Extension { .. } => "extension",
                    Step::HoistApplications => "hoist",
                };
                println!("{:>3}  {:<9}  {}", index, marker, step);
            }
        },
    }
    Ok(())
}
