//! conftree CLI Binary
//!
//! Command-line interface for inspecting and editing a configuration tree.

use anyhow::Context;
use clap::Parser;
use conftree::cli::{exit_code, map_error, Cli, RunContext};
use conftree::config::SettingsLoader;
use conftree::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)).context("Failed to initialize logging") {
        eprintln!("{:#}", e);
        process::exit(1);
    }

    info!(file = %cli.file.display(), "conftree starting");

    let context = match RunContext::new(&cli.file, cli.config.clone(), cli.json) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(exit_code(&e));
        }
    }
}

/// Build logging configuration from CLI args, environment, and settings
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    // Quiet unless asked
    if !cli.verbose && cli.log_level.is_none() {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let mut config = SettingsLoader::load(cli.config.as_deref())
        .map(|s| s.logging)
        .unwrap_or_default();
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    } else if cli.verbose && config.level == "info" {
        config.level = "debug".to_string();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
