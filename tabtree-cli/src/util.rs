//! Shared utility functions used across command modules.

use std::path::Path;

use tabtree_core::{ConfigError, ConfigManager, SidebarSettings};

use crate::error::CliError;

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<Option<ConfigManager>, CliError> {
    match config_path {
        Some(path) => Ok(Some(ConfigManager::with_config_dir(path))),
        None => match ConfigManager::new() {
            Ok(manager) => Ok(Some(manager)),
            Err(ConfigError::NoConfigDir) => Ok(None),
            Err(e) => Err(CliError::Config(format!("Failed to initialize config: {e}"))),
        },
    }
}

/// Loads sidebar settings; defaults when no configuration directory exists.
pub fn load_settings(config_path: Option<&Path>) -> Result<SidebarSettings, CliError> {
    let Some(manager) = create_config_manager(config_path)? else {
        return Ok(SidebarSettings::default());
    };
    manager
        .load_settings()
        .map_err(|e| CliError::Config(format!("Failed to load {}: {e}", manager.settings_path().display())))
}
