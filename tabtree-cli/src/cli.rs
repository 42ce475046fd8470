//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Replays host events and sidebar commands against an in-memory host
#[derive(Parser)]
#[command(name = "tabtree-cli")]
#[command(author, version, about = "tabtree command-line interface")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = "TABTREE_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Replay a script and print the resulting tree
    #[command(about = "Replay a JSON script of host actions and sidebar commands")]
    Replay {
        /// Script file
        script: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text", value_enum)]
        format: OutputFormat,
    },

    /// Decode a stored session snapshot
    #[command(about = "Print the containers recorded in a snapshot file")]
    Snapshot {
        /// File holding the stored JSON value
        file: PathBuf,
    },

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact tree dump
    #[default]
    Text,
    /// Output as JSON
    Json,
}
