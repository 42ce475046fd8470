//! Core data structures for the tab tree
//!
//! - `tab` - identifiers, [`TabEntry`] and its [`TabState`]
//! - `container` - [`Container`] and its tagged [`ContainerKind`]
//! - `host` - records exchanged with the host ([`HostTab`], [`HostWindow`], ...)

mod container;
mod host;
mod tab;

pub use container::{Container, ContainerId, ContainerKind};
pub use host::{ChangeInfo, HostTab, HostWindow, MoveTarget, TabUpdate};
pub use tab::{BatchId, TAB_ID_NONE, TabEntry, TabId, TabState, WindowId};
