//! Replay script format.
//!
//! A script describes the window before the sidebar loads and a list of
//! steps. Host steps go through the in-memory host and reach the engine as
//! events; sidebar steps call group operations directly.
//!
//! ```json
//! {
//!   "tabs": [{"url": "https://a.test"}, {"url": "https://b.test", "pinned": true}],
//!   "steps": [
//!     {"action": "open", "url": "https://c.test", "opener": 1},
//!     {"action": "group", "tabs": [1, 3]}
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabtree_core::TabId;

use crate::error::CliError;

/// A tab present before the sidebar loads. Ids are assigned from 1 in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTab {
    /// Page URL
    pub url: String,
    /// Pinned state
    #[serde(default)]
    pub pinned: bool,
}

/// Where a dragged selection lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPosition {
    /// Before the target's container
    Before,
    /// After the target's container
    After,
    /// Into the target's container
    Into,
}

/// One script step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Host opens a tab
    Open {
        /// Page URL
        url: String,
        /// Host index; end of the partition when absent
        #[serde(default)]
        index: Option<usize>,
        /// Tab that opened it
        #[serde(default)]
        opener: Option<TabId>,
        /// Open pinned
        #[serde(default)]
        pinned: bool,
        /// Make it active
        #[serde(default)]
        active: bool,
    },
    /// Host closes a tab
    Close {
        /// Tab to close
        tab: TabId,
    },
    /// Host moves a tab in its own strip
    Move {
        /// Tab to move
        tab: TabId,
        /// Final host index
        index: usize,
    },
    /// Host pins or unpins a tab
    Pin {
        /// Tab to change
        tab: TabId,
        /// New pinned state
        pinned: bool,
    },
    /// Host navigates a tab
    Navigate {
        /// Tab to navigate
        tab: TabId,
        /// New URL
        url: String,
    },
    /// Host activates a tab
    Activate {
        /// Tab to activate
        tab: TabId,
    },
    /// Host highlights tabs
    Highlight {
        /// Highlighted set
        tabs: Vec<TabId>,
    },
    /// Host fails the next `count` move requests
    FailMoves {
        /// Number of failing calls
        count: usize,
    },
    /// Sidebar: group the selection
    Group {
        /// Selection, anchor first
        tabs: Vec<TabId>,
    },
    /// Sidebar: detach the selection from its groups
    Detach {
        /// Selection
        tabs: Vec<TabId>,
    },
    /// Sidebar: ungroup the container of `tab`
    Ungroup {
        /// Any tab of the group
        tab: TabId,
    },
    /// Sidebar: collapse the container of `tab`
    Collapse {
        /// Any tab of the group
        tab: TabId,
    },
    /// Sidebar: expand the container of `tab`
    Expand {
        /// Any tab of the group
        tab: TabId,
    },
    /// Sidebar: drag the selection onto `target`
    Drop {
        /// Dragged tabs
        tabs: Vec<TabId>,
        /// Drop position relative to the target
        position: DropPosition,
        /// Target tab
        target: TabId,
    },
    /// Sidebar: pin or unpin the selection
    SetPinned {
        /// Selection
        tabs: Vec<TabId>,
        /// New pinned state
        pinned: bool,
    },
    /// Sidebar: rebuild from the host tab list
    Resync,
}

impl Step {
    /// Action name as written in scripts.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Move { .. } => "move",
            Self::Pin { .. } => "pin",
            Self::Navigate { .. } => "navigate",
            Self::Activate { .. } => "activate",
            Self::Highlight { .. } => "highlight",
            Self::FailMoves { .. } => "fail_moves",
            Self::Group { .. } => "group",
            Self::Detach { .. } => "detach",
            Self::Ungroup { .. } => "ungroup",
            Self::Collapse { .. } => "collapse",
            Self::Expand { .. } => "expand",
            Self::Drop { .. } => "drop",
            Self::SetPinned { .. } => "set_pinned",
            Self::Resync => "resync",
        }
    }
}

/// A complete replay script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Private window (no snapshot writes)
    #[serde(default)]
    pub incognito: bool,
    /// Stored snapshot value present before the sidebar loads
    #[serde(default)]
    pub snapshot: Option<String>,
    /// Tabs present before the sidebar loads
    #[serde(default)]
    pub tabs: Vec<ScriptTab>,
    /// Steps in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Parses a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Script` for malformed input.
    pub fn from_json(json: &str) -> Result<Self, CliError> {
        serde_json::from_str(json).map_err(|e| CliError::Script(e.to_string()))
    }

    /// Reads and parses a script file.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Io` or `CliError::Script`.
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
