//! Command handler modules for the CLI.

mod completions;
mod replay;
mod snapshot;

use tabtree_core::SidebarSettings;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(settings: SidebarSettings, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Replay { script, format } => replay::cmd_replay(settings, &script, format),
        Commands::Snapshot { file } => snapshot::cmd_snapshot(&file),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
