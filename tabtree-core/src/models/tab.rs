//! Tab identifiers and the per-tab entry of the visual tree
//!
//! Host identifiers are plain integers. They are wrapped in newtypes so a
//! tab id can never be passed where a window id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

use super::host::HostTab;

/// Raw value the host uses for "no tab".
pub const TAB_ID_NONE: i64 = -1;

/// Host-assigned tab identifier.
///
/// Unique while the tab exists; the host may reuse it only after the tab's
/// removal has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl TabId {
    /// The sentinel "no id" value.
    pub const NONE: Self = Self(TAB_ID_NONE);

    /// Wraps a raw host id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw host id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns true for the sentinel "no id" value.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == TAB_ID_NONE
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tab({})", self.0)
    }
}

/// Host-assigned window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl WindowId {
    /// Wraps a raw host id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw host id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Window({})", self.0)
    }
}

/// Identifier of one batch of host moves issued by a single user operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch({})", self.0)
    }
}

/// Synchronization state of a single tab entry.
///
/// Replaces the loose "enroute"/"restore" flags: a tab is either settled,
/// waiting for the host to confirm a move that belongs to a batch, or
/// waiting for a repair pass to re-evaluate its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabState {
    /// Position confirmed by the host.
    #[default]
    Stable,
    /// A host move was requested; structural rebuilds are suspended until
    /// the matching moved-event arrives.
    PendingMove(BatchId),
    /// Container must be re-evaluated by the next repair pass.
    PendingRestore,
}

impl TabState {
    /// Returns true when no marker is set.
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(self, Self::Stable)
    }

    /// Returns true while a requested move is unconfirmed.
    #[must_use]
    pub const fn is_enroute(self) -> bool {
        matches!(self, Self::PendingMove(_))
    }

    /// Returns the batch of a pending move.
    #[must_use]
    pub const fn batch(self) -> Option<BatchId> {
        match self {
            Self::PendingMove(batch) => Some(batch),
            Self::Stable | Self::PendingRestore => None,
        }
    }
}

impl fmt::Display for TabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::PendingMove(batch) => write!(f, "pending-move({})", batch.0),
            Self::PendingRestore => write!(f, "pending-restore"),
        }
    }
}

/// One tab in the visual tree.
///
/// Entries are owned exclusively by their [`Container`](super::Container);
/// they are created when a created-event is folded in and dropped when the
/// matching removed/detached-event arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    /// Host tab id
    pub id: TabId,
    /// Whether the host reports the tab as pinned
    pub pinned: bool,
    /// Whether the tab is part of the host's highlighted (multi-select) set
    pub highlighted: bool,
    /// Last known URL (the correlation key for session snapshots)
    pub url: String,
    /// Last known title
    pub title: String,
    /// Last known muted state
    pub muted: bool,
    /// Merge target of an in-progress group or drag operation
    pub merge_target: Option<TabId>,
    state: TabState,
}

impl TabEntry {
    /// Creates a stable, unpinned entry.
    #[must_use]
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            pinned: false,
            highlighted: false,
            url: url.into(),
            title: String::new(),
            muted: false,
            merge_target: None,
            state: TabState::Stable,
        }
    }

    /// Builds an entry from a host tab record.
    #[must_use]
    pub fn from_host(tab: &HostTab) -> Self {
        Self {
            id: tab.id,
            pinned: tab.pinned,
            highlighted: tab.highlighted,
            url: tab.url.clone(),
            title: tab.title.clone(),
            muted: tab.muted,
            merge_target: None,
            state: TabState::Stable,
        }
    }

    /// Sets the pinned flag.
    #[must_use]
    pub const fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Returns the synchronization state.
    #[must_use]
    pub const fn state(&self) -> TabState {
        self.state
    }

    /// Returns true while a requested move is unconfirmed.
    #[must_use]
    pub const fn is_enroute(&self) -> bool {
        self.state.is_enroute()
    }

    /// Marks the entry as moving within `batch`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::IllegalTransition` when a move is already pending.
    pub fn begin_move(&mut self, batch: BatchId) -> Result<(), TreeError> {
        if let TabState::PendingMove(_) = self.state {
            return Err(TreeError::IllegalTransition {
                tab: self.id,
                from: self.state,
                to: TabState::PendingMove(batch),
            });
        }
        self.state = TabState::PendingMove(batch);
        Ok(())
    }

    /// Asks the next repair pass to re-evaluate this entry.
    ///
    /// A pending move takes precedence and is left untouched.
    pub fn mark_restore(&mut self) {
        if self.state.is_stable() {
            self.state = TabState::PendingRestore;
        }
    }

    /// Returns the entry to [`TabState::Stable`].
    pub fn settle(&mut self) {
        self.state = TabState::Stable;
    }

    /// Clears both the state marker and the merge target.
    pub fn clear_markers(&mut self) {
        self.state = TabState::Stable;
        self.merge_target = None;
    }
}
