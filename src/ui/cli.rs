//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Magic Eye: flags files whose content does not match their extension
#[derive(Parser, Debug)]
#[command(name = "magic-eye")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output, one record per line
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch folders and report new or changed files
    Watch {
        /// Folder to watch (repeatable); replaces the configured list
        #[arg(short, long = "folder")]
        folders: Vec<PathBuf>,

        /// Settle delay for modified files, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Only print suspicious records
        #[arg(long)]
        suspicious_only: bool,
    },

    /// Identify files once and exit
    Identify {
        /// Files to analyse
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show configuration file path
    Path,
}
