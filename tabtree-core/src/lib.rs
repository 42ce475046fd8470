//! `tabtree` Core Library
//!
//! Keeps a browser window's visual tab tree (pinned segment, singleton
//! containers and tab groups) synchronized with the host's authoritative,
//! asynchronously mutating tab list, and runs user-initiated grouping and
//! reordering operations against it.
//!
//! # Crate Structure
//!
//! - [`models`] - Identifiers, tab entries, containers and host records
//! - [`tree`] - The window's visual tree, position lookups and container rules
//! - [`correlator`] - Pending-move registries and batch correlation
//! - [`sync`] - Event handlers folding host events into the tree
//! - [`group_ops`] - Group, detach, ungroup, collapse, drag and drop, pin
//! - [`snapshot`] - Session snapshots of the tree shape
//! - [`host`] - Host interface and an in-memory host simulator
//! - [`config`] - Sidebar settings and persistence
//! - [`tracing`] - Structured logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod config;
pub mod correlator;
pub mod error;
pub mod group_ops;
pub mod host;
pub mod models;
pub mod snapshot;
pub mod sync;
pub mod tracing;
pub mod tree;

pub use config::{ConfigManager, LoggingSettings, SidebarSettings};
pub use correlator::{DrainedBatch, MoveCorrelator, MoveIntent, MoveRegistry, PendingMove};
pub use error::{
    ConfigError, ConfigResult, GroupOpError, GroupOpResult, HostError, HostResult, SnapshotError,
    SnapshotResult, SyncError, SyncResult, TabTreeError, TreeError, TreeResult,
};
pub use group_ops::DropTarget;
pub use host::{HostEvent, InMemoryHost, NewTab, TabHost};
pub use models::{
    BatchId, ChangeInfo, Container, ContainerId, ContainerKind, HostTab, HostWindow, MoveTarget,
    TAB_ID_NONE, TabEntry, TabId, TabState, TabUpdate, WindowId,
};
pub use snapshot::{RestoredLayout, SNAPSHOT_KEY, SessionSnapshot, SnapshotRecord};
pub use sync::{SyncEngine, TreeChange};
pub use tree::{Location, OpenerPlacement, RepairReport, TabTree};
pub use self::tracing::{
    TracingConfig, TracingError, TracingLevel, TracingOutput, init_tracing,
    is_tracing_initialized,
};
