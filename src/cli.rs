//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sharelink_core::ClientLinkType;

/// Resolve cloud-drive share links into direct downloads.
///
/// Sharelink identifies the provider behind a share URL, resolves it to a
/// direct download URL and renders commands for common download clients.
#[derive(Parser, Debug)]
#[command(name = "sharelink")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory of .rhai resolver scripts to load
    #[arg(long, global = true, value_name = "DIR")]
    pub scripts_dir: Option<PathBuf>,

    /// Script execution timeout in seconds (1-600)
    #[arg(long, global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a share URL and print the direct download URL
    Resolve {
        /// Share URL to resolve
        url: String,
    },
    /// Resolve a share URL and print download-client commands
    Links {
        /// Share URL to resolve
        url: String,

        /// Only print the link for this client (aria2, curl, wget, ...)
        #[arg(short = 't', long = "type", value_name = "CODE", value_parser = parse_link_type)]
        link_type: Option<ClientLinkType>,
    },
    /// List built-in and script-registered providers
    Providers,
}

fn parse_link_type(code: &str) -> Result<ClientLinkType, String> {
    ClientLinkType::from_code(code).ok_or_else(|| {
        let known: Vec<&str> = ClientLinkType::ALL.iter().map(|t| t.code()).collect();
        format!("unknown client type '{code}', expected one of: {}", known.join(", "))
    })
}
