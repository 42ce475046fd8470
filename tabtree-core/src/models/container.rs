//! Containers: contiguous runs of tabs rendered together

use std::fmt;

use crate::error::TreeError;

use super::tab::{TabEntry, TabId};

/// Identifier of a container, stable for the container's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Container({})", self.0)
    }
}

/// What a container is, carried explicitly instead of inferred from styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// The pinned segment. Exactly one per window, always first, never pruned.
    Pinned,
    /// Exactly one unpinned tab, not marked as a group.
    Singleton,
    /// Two or more unpinned tabs marked as a group.
    Group {
        /// Whether only the first child is shown
        collapsed: bool,
    },
}

impl ContainerKind {
    /// Short label used in tree dumps.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pinned => "pinned",
            Self::Singleton => "singleton",
            Self::Group { collapsed: false } => "group",
            Self::Group { collapsed: true } => "collapsed-group",
        }
    }
}

/// Ordered run of tab entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: ContainerId,
    kind: ContainerKind,
    pub(crate) tabs: Vec<TabEntry>,
}

impl Container {
    /// Creates the (empty) pinned container.
    #[must_use]
    pub(crate) const fn pinned(id: ContainerId) -> Self {
        Self {
            id,
            kind: ContainerKind::Pinned,
            tabs: Vec::new(),
        }
    }

    /// Creates an unpinned container; the kind follows from the entry count.
    #[must_use]
    pub(crate) fn unpinned(id: ContainerId, tabs: Vec<TabEntry>) -> Self {
        let mut container = Self {
            id,
            kind: ContainerKind::Singleton,
            tabs,
        };
        container.normalize_kind();
        container
    }

    /// Applies a collapsed flag; ignored unless the container is a group.
    #[must_use]
    pub(crate) fn with_collapsed(mut self, collapsed: bool) -> Self {
        if let ContainerKind::Group { collapsed: flag } = &mut self.kind {
            *flag = collapsed;
        }
        self
    }

    /// Returns the container id.
    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    /// Returns the container kind.
    #[must_use]
    pub const fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Returns the entries in visual order.
    #[must_use]
    pub fn tabs(&self) -> &[TabEntry] {
        &self.tabs
    }

    /// Returns the ids of the entries in visual order.
    #[must_use]
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.id).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Returns true when the container holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Returns true for the pinned segment.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        matches!(self.kind, ContainerKind::Pinned)
    }

    /// Returns true for a group container.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self.kind, ContainerKind::Group { .. })
    }

    /// Returns true for a collapsed group.
    #[must_use]
    pub const fn is_collapsed(&self) -> bool {
        matches!(self.kind, ContainerKind::Group { collapsed: true })
    }

    /// Whether the container is drawn with group decoration.
    ///
    /// The pinned segment is decorated once it holds two tabs; this is
    /// cosmetic only and never changes its kind.
    #[must_use]
    pub fn is_visually_grouped(&self) -> bool {
        match self.kind {
            ContainerKind::Pinned => self.tabs.len() >= 2,
            ContainerKind::Singleton => false,
            ContainerKind::Group { .. } => true,
        }
    }

    /// First entry, if any.
    #[must_use]
    pub fn first(&self) -> Option<&TabEntry> {
        self.tabs.first()
    }

    /// Last entry, if any.
    #[must_use]
    pub fn last(&self) -> Option<&TabEntry> {
        self.tabs.last()
    }

    /// Slot of a tab within this container.
    #[must_use]
    pub fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    /// Returns true if the container holds the tab.
    #[must_use]
    pub fn contains(&self, id: TabId) -> bool {
        self.position(id).is_some()
    }

    /// Sets the collapsed flag of a group.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotAGroup` for pinned and singleton containers.
    pub(crate) fn set_collapsed(&mut self, collapsed: bool) -> Result<(), TreeError> {
        match &mut self.kind {
            ContainerKind::Group { collapsed: flag } => {
                *flag = collapsed;
                Ok(())
            }
            ContainerKind::Pinned | ContainerKind::Singleton => Err(TreeError::NotAGroup(self.id)),
        }
    }

    /// Re-derives Singleton/Group from the entry count.
    ///
    /// Returns true if the kind changed. The pinned segment never changes.
    pub(crate) fn normalize_kind(&mut self) -> bool {
        let next = match self.kind {
            ContainerKind::Pinned => return false,
            ContainerKind::Singleton if self.tabs.len() >= 2 => {
                ContainerKind::Group { collapsed: false }
            }
            ContainerKind::Group { .. } if self.tabs.len() <= 1 => ContainerKind::Singleton,
            kind => kind,
        };
        let changed = next != self.kind;
        self.kind = next;
        changed
    }
}
