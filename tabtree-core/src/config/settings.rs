//! Sidebar settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::snapshot::SNAPSHOT_KEY;
use crate::tracing::{TracingConfig, TracingLevel, TracingOutput};

/// Behaviour switches of the sidebar engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarSettings {
    /// Tabs opened from a grouped tab always go to the end of the group
    pub group_new_tabs_at_end: bool,
    /// Activating a tab inside a collapsed group expands the group
    pub expand_on_activate: bool,
    /// Write session snapshots after structural changes
    pub persist_snapshots: bool,
    /// Session storage key of the snapshot
    pub snapshot_key: String,
    /// Logging options
    pub logging: LoggingSettings,
}

impl Default for SidebarSettings {
    fn default() -> Self {
        Self {
            group_new_tabs_at_end: false,
            expand_on_activate: true,
            persist_snapshots: true,
            snapshot_key: SNAPSHOT_KEY.to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

impl SidebarSettings {
    /// Enables or disables the group-new-tabs-at-end policy
    #[must_use]
    pub const fn with_group_new_tabs_at_end(mut self, enabled: bool) -> Self {
        self.group_new_tabs_at_end = enabled;
        self
    }

    /// Enables or disables snapshot writes
    #[must_use]
    pub const fn with_persist_snapshots(mut self, enabled: bool) -> Self {
        self.persist_snapshots = enabled;
        self
    }

    /// Enables or disables expanding collapsed groups on activation
    #[must_use]
    pub const fn with_expand_on_activate(mut self, enabled: bool) -> Self {
        self.expand_on_activate = enabled;
        self
    }
}

/// Logging options stored with the sidebar settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: TracingLevel,
    /// Log to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl LoggingSettings {
    /// Tracing configuration matching these settings.
    #[must_use]
    pub fn to_tracing_config(&self) -> TracingConfig {
        let output = self
            .file
            .clone()
            .map_or(TracingOutput::Stderr, |path| TracingOutput::File { path });
        TracingConfig::new()
            .with_level(self.level)
            .with_output(output)
    }
}
