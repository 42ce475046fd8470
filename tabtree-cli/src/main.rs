//! `tabtree` CLI - replays host events and sidebar commands against an
//! in-memory host and prints the resulting tab tree.
//!
//! Useful for reproducing ordering bugs from a recorded sequence of tab
//! actions and for inspecting stored session snapshots.

mod cli;
mod commands;
mod error;
mod script;
mod util;

use clap::Parser;
use cli::Cli;
use tabtree_core::{TracingLevel, init_tracing};

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = util::load_settings(config_path).and_then(|settings| {
        let mut tracing_config = settings.logging.to_tracing_config();
        if cli.verbose > 0 || cli.quiet {
            tracing_config = tracing_config.with_level(TracingLevel::from_verbosity(cli.verbose, cli.quiet));
        }
        if let Err(e) = init_tracing(&tracing_config) {
            if !cli.quiet {
                eprintln!("Warning: {e}");
            }
        }
        commands::dispatch(settings, cli.command)
    });

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
