//! Host tab list interface
//!
//! The host is the authoritative tab list. It is consumed through the
//! [`TabHost`] trait and reports changes as [`HostEvent`]s, one at a time,
//! in an order of its choosing.
//!
//! # Module Structure
//!
//! - `memory` - [`InMemoryHost`], a complete host simulator

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostResult;
use crate::models::{ChangeInfo, HostTab, HostWindow, MoveTarget, TabId, TabUpdate, WindowId};

pub use memory::{InMemoryHost, NewTab};

/// Operations the engine calls on the host.
///
/// Every call is a suspension point; implementations may fail at any of them.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Moves `ids`, in the given order, as one contiguous block.
    ///
    /// `target.index` is the final index of the first listed tab, clamped to
    /// the block's partition. The host reports exactly one moved-event per
    /// listed tab, including tabs whose index did not change.
    ///
    /// # Errors
    ///
    /// Returns `HostError` when the host rejects the move.
    async fn move_tabs(&self, ids: &[TabId], target: MoveTarget) -> HostResult<Vec<HostTab>>;

    /// Changes pinned, muted or active state of a tab.
    ///
    /// # Errors
    ///
    /// Returns `HostError` when the tab is unknown or the update is rejected.
    async fn update_tab(&self, id: TabId, update: TabUpdate) -> HostResult<HostTab>;

    /// Reads the current record of a tab.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` for unknown tabs.
    async fn query_tab(&self, id: TabId) -> HostResult<HostTab>;

    /// Reads every tab of a window in host order.
    ///
    /// # Errors
    ///
    /// Returns `HostError::WindowNotFound` for unknown windows.
    async fn query_all_tabs(&self, window_id: WindowId) -> HostResult<Vec<HostTab>>;

    /// Reads the window the sidebar belongs to, with its tabs if `populate`.
    ///
    /// # Errors
    ///
    /// Returns `HostError` when no current window exists.
    async fn current_window(&self, populate: bool) -> HostResult<HostWindow>;

    /// Reads a per-window session value.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Storage` when storage is unavailable.
    async fn get_session_value(&self, key: &str, window_id: WindowId) -> HostResult<Option<String>>;

    /// Writes a per-window session value. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Storage` when storage is unavailable.
    async fn set_session_value(&self, key: &str, value: &str, window_id: WindowId) -> HostResult<()>;
}

/// One host notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A tab was opened
    Created {
        /// The new tab
        tab: HostTab,
    },
    /// A tab arrived from another window
    Attached {
        /// Tab id
        tab_id: TabId,
        /// Index in the new window
        new_position: usize,
        /// Receiving window
        new_window_id: WindowId,
    },
    /// A tab left for another window
    Detached {
        /// Tab id
        tab_id: TabId,
        /// Window the tab left
        old_window_id: WindowId,
    },
    /// A tab changed index within its window
    Moved {
        /// Tab id
        tab_id: TabId,
        /// Index before the move
        from_index: usize,
        /// Index after the move
        to_index: usize,
        /// Window of the tab
        window_id: WindowId,
    },
    /// A tab was closed
    Removed {
        /// Tab id
        tab_id: TabId,
        /// Window of the tab
        window_id: WindowId,
        /// Whether the whole window is closing
        #[serde(default)]
        is_window_closing: bool,
    },
    /// Tab properties changed
    Updated {
        /// Tab id
        tab_id: TabId,
        /// Changed fields
        change: ChangeInfo,
        /// Full record after the change
        tab: HostTab,
    },
    /// The active tab changed
    Activated {
        /// Newly active tab
        tab_id: TabId,
        /// Window of the tab
        window_id: WindowId,
    },
    /// The highlighted set changed
    Highlighted {
        /// Highlighted tabs
        tab_ids: Vec<TabId>,
        /// Window of the tabs
        window_id: WindowId,
    },
}

impl HostEvent {
    /// Short event name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Attached { .. } => "attached",
            Self::Detached { .. } => "detached",
            Self::Moved { .. } => "moved",
            Self::Removed { .. } => "removed",
            Self::Updated { .. } => "updated",
            Self::Activated { .. } => "activated",
            Self::Highlighted { .. } => "highlighted",
        }
    }

    /// Tab the event is about, if it concerns a single tab.
    #[must_use]
    pub const fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::Created { tab } => Some(tab.id),
            Self::Attached { tab_id, .. }
            | Self::Detached { tab_id, .. }
            | Self::Moved { tab_id, .. }
            | Self::Removed { tab_id, .. }
            | Self::Updated { tab_id, .. }
            | Self::Activated { tab_id, .. } => Some(*tab_id),
            Self::Highlighted { .. } => None,
        }
    }
}
