//! Loading and saving `sidebar.toml`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info_span};

use crate::error::{ConfigError, ConfigResult};
use crate::tracing::span_names;

use super::SidebarSettings;

/// Settings file name inside the configuration directory
const SETTINGS_FILE: &str = "sidebar.toml";

/// Directory name under the platform configuration directory
const APP_DIR: &str = "tabtree";

/// Reads and writes the sidebar settings file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `<platform config dir>/tabtree`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` when the platform has no
    /// configuration directory.
    pub fn new() -> ConfigResult<Self> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join(APP_DIR)))
    }

    /// Uses an explicit configuration directory.
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Configuration directory in use.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Full path of the settings file.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Loads the settings; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` when the file cannot be read and
    /// `ConfigError::Parse` when it is not valid TOML.
    pub fn load_settings(&self) -> ConfigResult<SidebarSettings> {
        Self::load_from(&self.settings_path())
    }

    /// Loads settings from an arbitrary file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Parse`.
    pub fn load_from(path: &Path) -> ConfigResult<SidebarSettings> {
        let _span = info_span!(span_names::CONFIG_LOAD, path = %path.display()).entered();
        if !path.exists() {
            debug!("Settings file missing, using defaults");
            return Ok(SidebarSettings::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Writes the settings, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` or `ConfigError::Io`.
    pub fn save_settings(&self, settings: &SidebarSettings) -> ConfigResult<()> {
        let path = self.settings_path();
        let _span = info_span!(span_names::CONFIG_SAVE, path = %path.display()).entered();
        let content =
            toml::to_string_pretty(settings).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::create_dir_all(&self.config_dir)?;
        fs::write(&path, content)?;
        debug!("Settings saved");
        Ok(())
    }
}
