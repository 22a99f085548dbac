//! CLI entry point for the sharelink tool.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;
mod runtime;

use cli::{Cli, Command};
use runtime::{RunSettings, build_pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let file_config = match &cli.config {
        Some(path) => Some(app_config::load_config_file(path)?),
        None => {
            let loaded = app_config::load_default_config()?;
            debug!(path = ?loaded.path, found = loaded.config.is_some(), "Default config checked");
            loaded.config
        }
    };

    let settings = RunSettings::from_sources(&cli, file_config.as_ref());
    debug!(?settings, "Effective settings");
    let pipeline = build_pipeline(&settings)?;

    match &cli.command {
        Command::Resolve { url } => commands::run_resolve(&pipeline, url).await,
        Command::Links { url, link_type } => commands::run_links(&pipeline, url, *link_type).await,
        Command::Providers => commands::run_providers(&pipeline),
    }
}
