//! Records exchanged with the host tab list

use serde::{Deserialize, Serialize};

use super::tab::{TabId, WindowId};

/// The host's view of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTab {
    /// Host tab id
    pub id: TabId,
    /// Window the tab belongs to
    pub window_id: WindowId,
    /// Position in the window's tab strip (pinned tabs first)
    pub index: usize,
    /// Pinned state
    #[serde(default)]
    pub pinned: bool,
    /// Whether this is the window's active tab
    #[serde(default)]
    pub active: bool,
    /// Whether the tab is in the highlighted set
    #[serde(default)]
    pub highlighted: bool,
    /// Muted state
    #[serde(default)]
    pub muted: bool,
    /// Current URL
    #[serde(default)]
    pub url: String,
    /// Current title
    #[serde(default)]
    pub title: String,
    /// Tab that opened this one, if the host tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_tab_id: Option<TabId>,
}

impl HostTab {
    /// Creates a record with default flags.
    #[must_use]
    pub fn new(id: TabId, window_id: WindowId, index: usize, url: impl Into<String>) -> Self {
        Self {
            id,
            window_id,
            index,
            pinned: false,
            active: false,
            highlighted: false,
            muted: false,
            url: url.into(),
            title: String::new(),
            opener_tab_id: None,
        }
    }
}

/// The host's view of a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostWindow {
    /// Host window id
    pub id: WindowId,
    /// Private/incognito windows never persist snapshots
    pub incognito: bool,
    /// Tabs, present when the window was requested with `populate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<HostTab>>,
}

/// Fields changed by an updated-event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// New pinned state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// New muted state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    /// New URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ChangeInfo {
    /// Returns true if nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pinned.is_none() && self.muted.is_none() && self.url.is_none() && self.title.is_none()
    }
}

/// Properties accepted by the host's update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabUpdate {
    /// Pin or unpin
    pub pinned: Option<bool>,
    /// Mute or unmute
    pub muted: Option<bool>,
    /// Make the tab active
    pub active: Option<bool>,
}

impl TabUpdate {
    /// Update that only changes the pinned state.
    #[must_use]
    pub const fn pinned(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            muted: None,
            active: None,
        }
    }

    /// Update that activates the tab.
    #[must_use]
    pub const fn activate() -> Self {
        Self {
            pinned: None,
            muted: None,
            active: Some(true),
        }
    }
}

/// Destination of a host move.
///
/// `index` is the final position of the first moved tab once the move is
/// complete; the remaining tabs follow it contiguously. A negative index
/// means "end of the window".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    /// Final index of the first moved tab
    pub index: i64,
    /// Destination window
    pub window_id: WindowId,
}

impl MoveTarget {
    /// Target at a concrete index.
    #[must_use]
    pub const fn at(window_id: WindowId, index: usize) -> Self {
        Self {
            index: index as i64,
            window_id,
        }
    }

    /// Target at the end of the window.
    #[must_use]
    pub const fn end(window_id: WindowId) -> Self {
        Self {
            index: -1,
            window_id,
        }
    }
}
