//! The window's visual tab tree
//!
//! [`TabTree`] is the single owned aggregate every handler mutates. It is an
//! ordered list of containers whose first element is always the pinned
//! segment. Node identity is the host tab id; positions are never cached
//! and are re-derived from the live structure by the functions in [`index`].
//!
//! # Module Structure
//!
//! - `index` - pure position lookups (visual index, container, neighbours)
//! - `containers` - placement, pruning, merging and the repair pass

mod containers;
pub mod index;

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::models::{Container, ContainerId, ContainerKind, TabEntry, TabId, WindowId};

pub use containers::{OpenerPlacement, RepairReport};
pub use index::Location;

/// Ordered forest of containers mirroring one host window.
#[derive(Debug, Clone)]
pub struct TabTree {
    window_id: WindowId,
    containers: Vec<Container>,
    next_container: u64,
    active: Option<TabId>,
}

impl TabTree {
    /// Creates a tree holding only the empty pinned segment.
    #[must_use]
    pub fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            containers: vec![Container::pinned(ContainerId(0))],
            next_container: 1,
            active: None,
        }
    }

    /// Window this tree mirrors.
    #[must_use]
    pub const fn window_id(&self) -> WindowId {
        self.window_id
    }

    /// All containers, pinned segment first.
    #[must_use]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// The pinned segment.
    #[must_use]
    pub fn pinned(&self) -> &Container {
        &self.containers[0]
    }

    /// Unpinned containers in visual order.
    #[must_use]
    pub fn unpinned(&self) -> &[Container] {
        &self.containers[1..]
    }

    /// Looks up a container by id.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.iter().find(|c| c.id() == id)
    }

    /// Position of a container in the container list.
    #[must_use]
    pub fn container_index(&self, id: ContainerId) -> Option<usize> {
        self.containers.iter().position(|c| c.id() == id)
    }

    /// Total number of tabs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.iter().map(Container::len).sum()
    }

    /// Returns true when the window has no tabs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.iter().all(Container::is_empty)
    }

    /// Number of pinned tabs.
    #[must_use]
    pub fn pinned_count(&self) -> usize {
        self.containers[0].len()
    }

    /// Returns true if the tree holds the tab.
    #[must_use]
    pub fn contains(&self, id: TabId) -> bool {
        self.entry(id).is_some()
    }

    /// Looks up an entry by host id.
    #[must_use]
    pub fn entry(&self, id: TabId) -> Option<&TabEntry> {
        self.entries().find(|e| e.id == id)
    }

    /// Mutable lookup by host id.
    pub fn entry_mut(&mut self, id: TabId) -> Option<&mut TabEntry> {
        self.containers
            .iter_mut()
            .flat_map(|c| c.tabs.iter_mut())
            .find(|e| e.id == id)
    }

    /// Entries in visual order.
    pub fn entries(&self) -> impl Iterator<Item = &TabEntry> {
        self.containers.iter().flat_map(|c| c.tabs.iter())
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut TabEntry> {
        self.containers.iter_mut().flat_map(|c| c.tabs.iter_mut())
    }

    /// Tab ids in visual order. Equals the host order when no move is in flight.
    #[must_use]
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.entries().map(|e| e.id).collect()
    }

    /// Currently active tab.
    #[must_use]
    pub const fn active(&self) -> Option<TabId> {
        self.active
    }

    pub(crate) fn set_active(&mut self, id: Option<TabId>) {
        self.active = id;
    }

    /// Highlighted tabs in visual order.
    #[must_use]
    pub fn highlighted(&self) -> Vec<TabId> {
        self.entries()
            .filter(|e| e.highlighted)
            .map(|e| e.id)
            .collect()
    }

    /// Tabs whose requested move is still unconfirmed.
    #[must_use]
    pub fn enroute_tabs(&self) -> Vec<TabId> {
        self.entries()
            .filter(|e| e.is_enroute())
            .map(|e| e.id)
            .collect()
    }

    /// Compact textual form: `[P 1 2] [3] {4 5} {6 7}*`.
    ///
    /// Singletons use brackets, groups braces, a trailing `*` marks a
    /// collapsed group and a trailing `~` marks an enroute tab.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, container) in self.containers.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let (open, close) = match container.kind() {
                ContainerKind::Pinned => ("[P", "]"),
                ContainerKind::Singleton => ("[", "]"),
                ContainerKind::Group { .. } => ("{", "}"),
            };
            out.push_str(open);
            for (slot, entry) in container.tabs().iter().enumerate() {
                if slot > 0 || container.is_pinned() {
                    out.push(' ');
                }
                let _ = write!(out, "{}", entry.id.get());
                if entry.is_enroute() {
                    out.push('~');
                }
            }
            out.push_str(close);
            if container.is_collapsed() {
                out.push('*');
            }
        }
        out
    }

    /// Lists every violated structural invariant; empty when the tree is sound.
    ///
    /// Checked: the pinned segment comes first and is unique, entries sit in
    /// the partition matching their pinned flag, no unpinned container is
    /// empty, Singleton/Group kinds match their entry counts, ids are unique.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.containers[0].is_pinned() {
            problems.push("first container is not the pinned segment".to_string());
        }
        let mut seen = HashSet::new();
        for (i, container) in self.containers.iter().enumerate() {
            if i > 0 && container.is_pinned() {
                problems.push(format!("extra pinned container at {i}"));
            }
            if i > 0 && container.is_empty() {
                problems.push(format!("empty {} at {i}", container.id()));
            }
            match container.kind() {
                ContainerKind::Singleton if container.len() != 1 => {
                    problems.push(format!("singleton {} holds {}", container.id(), container.len()));
                }
                ContainerKind::Group { .. } if container.len() < 2 => {
                    problems.push(format!("group {} holds {}", container.id(), container.len()));
                }
                _ => {}
            }
            for entry in container.tabs() {
                if entry.pinned != container.is_pinned() {
                    problems.push(format!("{} in wrong partition", entry.id));
                }
                if !seen.insert(entry.id) {
                    problems.push(format!("{} appears twice", entry.id));
                }
            }
        }
        problems
    }

    pub(crate) fn alloc_container_id(&mut self) -> ContainerId {
        let id = ContainerId(self.next_container);
        self.next_container += 1;
        id
    }

    pub(crate) fn new_container(&mut self, tabs: Vec<TabEntry>) -> Container {
        let id = self.alloc_container_id();
        Container::unpinned(id, tabs)
    }

    pub(crate) fn containers_mut(&mut self) -> &mut Vec<Container> {
        &mut self.containers
    }
}
