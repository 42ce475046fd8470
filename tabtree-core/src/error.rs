//! Error types for the tab tree engine
//!
//! Each area has its own error enum and `Result` alias; [`TabTreeError`]
//! aggregates them for callers that do not care which layer failed.

use thiserror::Error;

use crate::models::{ContainerId, TabId, TabState, WindowId};

/// Errors reported by (or about) the host tab list.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host rejected an operation
    #[error("host rejected {operation}: {reason}")]
    Rejected {
        /// Operation name (e.g. `move_tabs`)
        operation: &'static str,
        /// Host-supplied reason
        reason: String,
    },

    /// The host does not know the tab
    #[error("host has no tab {0}")]
    TabNotFound(TabId),

    /// The host does not know the window
    #[error("host has no window {0}")]
    WindowNotFound(WindowId),

    /// Session storage failed
    #[error("session storage error: {0}")]
    Storage(String),
}

/// Result type for host operations
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Errors raised by structural operations on the visual tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The tree holds no entry for the tab
    #[error("tab not found in tree: {0}")]
    TabNotFound(TabId),

    /// The tree holds no such container
    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),

    /// The operation needs a group container
    #[error("{0} is not a group")]
    NotAGroup(ContainerId),

    /// The opener cannot host new tabs (missing or pinned)
    #[error("invalid opener: {0}")]
    InvalidOpener(TabId),

    /// A state transition that the tab's current state forbids
    #[error("illegal transition for {tab}: {from} -> {to}")]
    IllegalTransition {
        /// Tab whose state was about to change
        tab: TabId,
        /// Current state
        from: TabState,
        /// Requested state
        to: TabState,
    },
}

/// Result type for tree operations
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Errors raised by session snapshot encoding and storage.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Encoding failed
    #[error("snapshot serialization error: {0}")]
    Serialization(serde_json::Error),

    /// Stored value is not a valid snapshot
    #[error("snapshot deserialization error: {0}")]
    Deserialization(serde_json::Error),

    /// Reading or writing session storage failed
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// Errors raised while folding host events into the tree.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A host call made by a handler failed
    #[error(transparent)]
    Host(#[from] HostError),

    /// A structural operation failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Snapshot handling failed
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result type for event handlers
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised by user-initiated group operations.
#[derive(Debug, Error)]
pub enum GroupOpError {
    /// Too few eligible tabs were selected
    #[error("operation needs at least {required} unpinned tabs, got {found}")]
    NotEnoughTabs {
        /// Minimum number of tabs
        required: usize,
        /// Number of eligible tabs in the selection
        found: usize,
    },

    /// The selection contains a pinned tab where only unpinned tabs are allowed
    #[error("pinned tab cannot take part in this operation: {0}")]
    PinnedTab(TabId),

    /// The selection mixes pinned and unpinned tabs
    #[error("selection mixes pinned and unpinned tabs")]
    MixedPartitions,

    /// The selection names a tab the tree does not know
    #[error("unknown tab in selection: {0}")]
    UnknownTab(TabId),

    /// The drop target is part of the dragged selection
    #[error("cannot drop {0} onto itself")]
    DropOntoSelf(TabId),

    /// A structural operation failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The host rejected the move; `pending` tabs keep their markers
    #[error("host call failed, {} tab(s) left pending: {source}", pending.len())]
    Host {
        /// Underlying host error
        #[source]
        source: HostError,
        /// Tabs whose optimistic markers were left in place
        pending: Vec<TabId>,
    },
}

impl GroupOpError {
    /// Tabs left enroute by a rejected host call.
    #[must_use]
    pub fn pending_tabs(&self) -> &[TabId] {
        match self {
            Self::Host { pending, .. } => pending,
            _ => &[],
        }
    }
}

/// Result type for group operations
pub type GroupOpResult<T> = std::result::Result<T, GroupOpError>;

/// Errors raised by configuration loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("config parse error: {0}")]
    Parse(String),

    /// TOML could not be produced
    #[error("config serialize error: {0}")]
    Serialize(String),

    /// No configuration directory is available on this platform
    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum TabTreeError {
    /// Host error
    #[error(transparent)]
    Host(#[from] HostError),

    /// Tree error
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Snapshot error
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Sync error
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Group operation error
    #[error(transparent)]
    GroupOp(#[from] GroupOpError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}
