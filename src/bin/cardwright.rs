//! Cardwright CLI Binary
//!
//! Command-line interface for ordered course content and AI card generation.

use cardwright::cli::{map_error, Cli, RunContext};
use cardwright::config::{CardwrightConfig, ConfigLoader};
use cardwright::error::ApiError;
use cardwright::logging::{init_logging, resolve_log_file_path, LoggingConfig};
use clap::Parser;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // One load serves both logging and the run context.
    let loaded = load_config(&cli);
    let base = loaded.as_ref().map(|c| c.logging.clone()).unwrap_or_default();
    if let Err(e) = init_logging(Some(&apply_log_flags(&cli, base))) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let context = loaded.and_then(|config| {
        RunContext::from_config(cli.workspace.clone(), &config, cli.owner.as_deref())
    });
    let context = match context {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Failed to set up workspace");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };
    info!(owner = context.owner(), workspace = %context.workspace_root().display(), "Cardwright ready");

    match context.execute(&cli.command).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<CardwrightConfig, ApiError> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&cli.workspace)?,
    };
    Ok(config)
}

/// Fold `--quiet`, `--verbose` and the `--log-*` flags over the configured logging.
/// `--verbose` mirrors file logs to stderr unless `--log-output` says otherwise.
fn apply_log_flags(cli: &Cli, mut config: LoggingConfig) -> LoggingConfig {
    if cli.quiet {
        config.enabled = false;
        return config;
    }
    if cli.verbose {
        config.level = "debug".to_string();
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }

    if config.output.starts_with("file") {
        if let Ok(path) =
            resolve_log_file_path(cli.log_file.clone(), config.file.clone(), Some(cli.workspace.as_path()))
        {
            config.file = Some(path);
        }
    }
    config
}
