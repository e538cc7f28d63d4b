//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// prm - Puppet Runtime Manager
#[derive(Debug, Parser)]
#[command(
    name = "prm",
    about = "Run Puppet content tools inside isolated, version-pinned backends",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a tool against the code in the current directory
    Exec {
        /// Tool to run
        #[arg(value_name = "AUTHOR/ID")]
        tool: String,

        /// Code directory mounted into the backend (default: current directory)
        #[arg(long)]
        codedir: Option<PathBuf>,

        /// Cache directory mounted into the backend (default: per-tool cache)
        #[arg(long)]
        cachedir: Option<PathBuf>,

        /// Arguments passed through to the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TOOL_ARGS")]
        args: Vec<String>,
    },

    /// Show the active configuration and backend health
    Status {
        /// Output format (human, json)
        #[arg(short, long, default_value = "human")]
        format: String,
    },

    /// Change a persisted setting
    Set {
        #[command(subcommand)]
        setting: SetCommand,
    },

    /// Show an active setting
    Get {
        #[command(subcommand)]
        setting: GetCommand,
    },
}

/// Settings that can be changed
#[derive(Debug, Subcommand)]
pub enum SetCommand {
    /// Puppet version tools run against
    Puppet {
        /// Semantic version, e.g. 7.0.0
        version: String,
    },

    /// Backend used to run tools
    Backend {
        /// Backend name (docker)
        backend: String,
    },
}

/// Settings that can be shown
#[derive(Debug, Subcommand)]
pub enum GetCommand {
    /// Puppet version tools run against
    Puppet,

    /// Backend used to run tools
    Backend,
}
