//! Container rules
//!
//! Placement of new entries, folding of confirmed moves, merging, splitting
//! and the repair pass. Every operation re-derives positions from the live
//! tree when it runs; indices supplied by callers are host indices and are
//! clamped against the current structure rather than trusted.

use std::collections::HashMap;

use tracing::debug;

use crate::correlator::MoveIntent;
use crate::error::{TreeError, TreeResult};
use crate::models::{Container, ContainerId, TabEntry, TabId, TabState};

use super::TabTree;
use super::index::{self, Location};

/// Where [`TabTree::place_after_opener`] put a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenerPlacement {
    /// Container that received the entry
    pub container: ContainerId,
    /// Host index the tab must be moved to for host order to match the tree
    pub follow_up: Option<usize>,
    /// Whether the opener's collapsed container was expanded
    pub expanded: bool,
}

/// Counters of one [`TabTree::repair`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Entries moved across the pinned/unpinned boundary
    pub repartitioned: usize,
    /// Entries merged into the preceding container
    pub merged: usize,
    /// Restore markers cleared
    pub settled: usize,
    /// Empty containers removed
    pub pruned: usize,
}

impl RepairReport {
    /// Returns true if the pass changed nothing structural.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.repartitioned == 0 && self.merged == 0 && self.pruned == 0
    }
}

impl TabTree {
    /// Inserts a pinned entry at the slot matching `host_index`.
    ///
    /// Returns the slot used. The pinned segment never changes kind; it is
    /// drawn as a group once it holds two tabs.
    pub fn place_in_pinned(&mut self, mut entry: TabEntry, host_index: usize) -> usize {
        entry.pinned = true;
        let pinned = &mut self.containers_mut()[0];
        let slot = host_index.min(pinned.len());
        pinned.tabs.insert(slot, entry);
        slot
    }

    /// Inserts an unpinned entry into its opener's container.
    ///
    /// When `host_index` falls inside the opener's container (and
    /// `at_end` is off) the entry takes that slot. Otherwise it is appended
    /// and [`OpenerPlacement::follow_up`] names the host index the tab must
    /// be moved to. A collapsed container is expanded.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::InvalidOpener` when the opener is unknown or pinned.
    pub fn place_after_opener(
        &mut self,
        mut entry: TabEntry,
        opener: TabId,
        host_index: usize,
        at_end: bool,
    ) -> TreeResult<OpenerPlacement> {
        let loc = index::locate(self, opener).ok_or(TreeError::InvalidOpener(opener))?;
        if loc.container == 0 {
            return Err(TreeError::InvalidOpener(opener));
        }
        entry.pinned = false;
        let start = index::container_start(self, loc.container);
        let len = self.containers()[loc.container].len();
        let end = start + len;
        let (slot, follow_up) = if !at_end && (start..=end).contains(&host_index) {
            (host_index - start, None)
        } else {
            (len, (host_index != end).then_some(end))
        };

        let container = &mut self.containers_mut()[loc.container];
        container.tabs.insert(slot, entry);
        container.normalize_kind();
        let expanded = container.is_collapsed();
        if expanded {
            container.set_collapsed(false)?;
        }
        Ok(OpenerPlacement {
            container: container.id(),
            follow_up,
            expanded,
        })
    }

    /// Places an unpinned entry by looking at its would-be neighbours.
    ///
    /// If the tabs on both sides of `host_index` share a container the entry
    /// joins it; otherwise it gets a new singleton right before the tab at
    /// `host_index` (or at the end).
    pub fn place_by_neighbor_heuristic(&mut self, mut entry: TabEntry, host_index: usize) -> ContainerId {
        entry.pinned = false;
        let u = self.unpinned_offset(host_index);
        match self.unpinned_neighbors(u) {
            (Some(left), Some(right)) if left.container == right.container => {
                let id = self.containers()[right.container].id();
                self.insert_at(right, entry);
                id
            }
            (_, right) => {
                let position = right.map_or(self.containers().len(), |r| r.container);
                self.insert_singleton(position, entry)
            }
        }
    }

    /// Removes an empty container or re-derives its kind.
    ///
    /// Returns true if the container was removed. The pinned segment is
    /// never removed.
    pub fn prune(&mut self, id: ContainerId) -> bool {
        let Some(position) = self.container_index(id) else {
            return false;
        };
        let container = &mut self.containers_mut()[position];
        if container.is_pinned() {
            return false;
        }
        if container.is_empty() {
            self.containers_mut().remove(position);
            return true;
        }
        container.normalize_kind();
        false
    }

    /// Prunes every container; returns how many were removed.
    pub fn prune_all(&mut self) -> usize {
        let containers = self.containers_mut();
        let before = containers.len();
        containers.retain(|c| c.is_pinned() || !c.is_empty());
        for container in containers.iter_mut() {
            container.normalize_kind();
        }
        before - containers.len()
    }

    /// Moves every entry of `from` into `into` at `insertion_point`, then
    /// prunes `from`.
    ///
    /// The caller keeps host order intact by only merging neighbours.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::ContainerNotFound` for unknown ids and
    /// `TreeError::NotAGroup` when either side is the pinned segment.
    pub fn merge(&mut self, from: ContainerId, into: ContainerId, insertion_point: usize) -> TreeResult<()> {
        let src = self.container_index(from).ok_or(TreeError::ContainerNotFound(from))?;
        let dst = self.container_index(into).ok_or(TreeError::ContainerNotFound(into))?;
        if src == 0 {
            return Err(TreeError::NotAGroup(from));
        }
        if dst == 0 {
            return Err(TreeError::NotAGroup(into));
        }
        if src == dst {
            return Ok(());
        }
        let moved = std::mem::take(&mut self.containers_mut()[src].tabs);
        let target = &mut self.containers_mut()[dst];
        let at = insertion_point.min(target.len());
        target.tabs.splice(at..at, moved);
        target.normalize_kind();
        self.prune(from);
        Ok(())
    }

    /// Extracts `id` into its own singleton, splitting its container around it.
    ///
    /// Entries before the tab keep the original container; entries after it
    /// move to a new container. Returns the singleton's id (the existing one
    /// when the tab is already alone).
    ///
    /// # Errors
    ///
    /// Returns `TreeError::TabNotFound` for unknown tabs and
    /// `TreeError::NotAGroup` for pinned tabs.
    pub fn split_out(&mut self, id: TabId) -> TreeResult<ContainerId> {
        let loc = index::locate(self, id).ok_or(TreeError::TabNotFound(id))?;
        let container = &self.containers()[loc.container];
        if container.is_pinned() {
            return Err(TreeError::NotAGroup(container.id()));
        }
        if container.len() == 1 {
            return Ok(container.id());
        }

        let mut taken = self.containers_mut()[loc.container].tabs.split_off(loc.slot);
        let rest = taken.split_off(1);
        let singleton = self.new_container(taken);
        let singleton_id = singleton.id();
        if self.containers()[loc.container].is_empty() {
            let original = &mut self.containers_mut()[loc.container];
            original.tabs = rest;
            original.normalize_kind();
            self.containers_mut().insert(loc.container, singleton);
        } else {
            self.containers_mut()[loc.container].normalize_kind();
            self.containers_mut().insert(loc.container + 1, singleton);
            if !rest.is_empty() {
                let suffix = self.new_container(rest);
                self.containers_mut().insert(loc.container + 2, suffix);
            }
        }
        Ok(singleton_id)
    }

    /// Replaces a group by one singleton per child, in place.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotAGroup` unless `id` is a group container.
    pub fn ungroup(&mut self, id: ContainerId) -> TreeResult<Vec<ContainerId>> {
        let position = self.container_index(id).ok_or(TreeError::ContainerNotFound(id))?;
        if !self.containers()[position].is_group() {
            return Err(TreeError::NotAGroup(id));
        }
        let tabs = std::mem::take(&mut self.containers_mut()[position].tabs);
        self.containers_mut().remove(position);
        let mut created = Vec::with_capacity(tabs.len());
        for (offset, entry) in tabs.into_iter().enumerate() {
            let container = self.new_container(vec![entry]);
            created.push(container.id());
            self.containers_mut().insert(position + offset, container);
        }
        Ok(created)
    }

    /// Sets the collapsed flag of a group.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::ContainerNotFound` or `TreeError::NotAGroup`.
    pub fn set_collapsed(&mut self, id: ContainerId, collapsed: bool) -> TreeResult<()> {
        let position = self.container_index(id).ok_or(TreeError::ContainerNotFound(id))?;
        self.containers_mut()[position].set_collapsed(collapsed)
    }

    /// Removes a tab and prunes; clears the active tab if it was this one.
    pub fn remove_tab(&mut self, id: TabId) -> Option<TabEntry> {
        let (_, entry) = self.take_entry(id)?;
        self.prune_all();
        if self.active() == Some(id) {
            self.set_active(None);
        }
        Some(entry)
    }

    /// Folds a confirmed move of `id` to host index `to` into the tree.
    ///
    /// `pinned` is the host's pinned state after the move. Neighbours are
    /// computed with the tab taken out, so an entry moved to either edge of
    /// its own container stays in it; a move that lands between two other
    /// containers starts a new singleton. An entry carrying a merge target
    /// joins the target's container when that container is adjacent.
    ///
    /// `from` is only logged. The direction of the move never breaks a tie:
    /// with the tab taken out, a neighbour in its own container already
    /// decides which edge of that container it stays on, and a tab with no
    /// such neighbour has left its run and is split off.
    ///
    /// Returns false when the tab already sits at `to` with nothing to
    /// change, which makes repeated confirmations no-ops.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::TabNotFound` when the tree does not hold `id`.
    pub fn apply_move(&mut self, id: TabId, from: usize, to: usize, pinned: bool) -> TreeResult<bool> {
        let current = index::visual_index(self, id).ok_or(TreeError::TabNotFound(id))?;
        let entry = self.entry(id).ok_or(TreeError::TabNotFound(id))?;
        let merge_target = entry.merge_target.filter(|t| *t != id);
        if current == to && entry.pinned == pinned && merge_target.is_none() {
            return Ok(false);
        }

        let (own, mut entry) = self.take_entry(id).ok_or(TreeError::TabNotFound(id))?;
        entry.pinned = pinned;
        if pinned {
            self.place_in_pinned(entry, to);
        } else {
            self.place_moved_unpinned(entry, to, own, merge_target);
        }
        self.prune_all();
        debug!(tab = %id, from, to, pinned, "Folded move into tree");
        Ok(true)
    }

    /// Puts the members of a landed batch where the batch's intent says.
    ///
    /// Members no longer in the tree are skipped. [`MoveIntent::InPlace`]
    /// is a no-op here; those moves are folded by host index.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::TabNotFound` or `TreeError::InvalidOpener` when an
    /// [`MoveIntent::AppendTo`] anchor is missing or pinned. The tree is
    /// unchanged in that case.
    pub fn apply_intent(&mut self, intent: &MoveIntent, members: &[TabId]) -> TreeResult<()> {
        match *intent {
            MoveIntent::AppendTo(anchor) => {
                let loc = index::locate(self, anchor).ok_or(TreeError::TabNotFound(anchor))?;
                if loc.container == 0 {
                    return Err(TreeError::InvalidOpener(anchor));
                }
                let moved = self.take_entries(members, Some(anchor));
                let container = &mut self.containers_mut()[loc.container];
                for mut entry in moved {
                    entry.pinned = false;
                    container.tabs.push(entry);
                }
            }
            MoveIntent::Singletons { before } => {
                let moved = self.take_entries(members, None);
                let position = before
                    .filter(|b| !members.contains(b))
                    .and_then(|b| index::locate(self, b))
                    .filter(|loc| loc.container != 0)
                    .map_or(self.containers().len(), |loc| loc.container);
                for (offset, mut entry) in moved.into_iter().enumerate() {
                    entry.pinned = false;
                    self.insert_singleton(position + offset, entry);
                }
            }
            MoveIntent::Pinned { before } => {
                let moved = self.take_entries(members, None);
                let pinned = &mut self.containers_mut()[0];
                let slot = before
                    .and_then(|b| pinned.position(b))
                    .unwrap_or(pinned.len());
                for (offset, mut entry) in moved.into_iter().enumerate() {
                    entry.pinned = true;
                    pinned.tabs.insert(slot + offset, entry);
                }
            }
            MoveIntent::InPlace => return Ok(()),
        }
        self.prune_all();
        Ok(())
    }

    /// Idempotent fixpoint pass over the whole tree, O(tabs).
    ///
    /// Moves entries stranded on the wrong side of the pinned boundary,
    /// merges runs whose merge target sits in the preceding container,
    /// clears merge targets and restore markers of settled entries and
    /// prunes. Entries with a pending move are left alone.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport {
            repartitioned: self.fix_partition_boundary(),
            merged: self.merge_marked_runs(),
            ..RepairReport::default()
        };
        for entry in self.entries_mut() {
            match entry.state() {
                TabState::PendingMove(_) => {}
                TabState::PendingRestore => {
                    entry.clear_markers();
                    report.settled += 1;
                }
                TabState::Stable => entry.merge_target = None,
            }
        }
        report.pruned = self.prune_all();
        debug!(
            repartitioned = report.repartitioned,
            merged = report.merged,
            settled = report.settled,
            pruned = report.pruned,
            "Repair pass complete"
        );
        report
    }

    /// Replaces the whole structure, keeping the pinned segment's id.
    pub(crate) fn rebuild(&mut self, pinned: Vec<TabEntry>, groups: Vec<(Vec<TabEntry>, bool)>) {
        let mut segment = Container::pinned(self.containers()[0].id());
        segment.tabs = pinned
            .into_iter()
            .map(|e| e.with_pinned(true))
            .collect();
        let mut containers = Vec::with_capacity(groups.len() + 1);
        containers.push(segment);
        for (tabs, collapsed) in groups {
            if tabs.is_empty() {
                continue;
            }
            let tabs = tabs.into_iter().map(|e| e.with_pinned(false)).collect();
            containers.push(self.new_container(tabs).with_collapsed(collapsed));
        }
        *self.containers_mut() = containers;
        if self.active().is_some_and(|id| !self.contains(id)) {
            self.set_active(None);
        }
    }

    fn place_moved_unpinned(&mut self, entry: TabEntry, to: usize, own: usize, merge_target: Option<TabId>) {
        let u = self.unpinned_offset(to);
        let (left, right) = self.unpinned_neighbors(u);

        let target = merge_target
            .and_then(|t| index::locate(self, t))
            .map(|loc| loc.container)
            .filter(|&c| c != 0);
        if let Some(container) = target {
            if let Some(l) = left.filter(|l| l.container == container) {
                self.insert_at(after(l), entry);
                return;
            }
            if let Some(r) = right.filter(|r| r.container == container) {
                self.insert_at(r, entry);
                return;
            }
        }

        match (left, right) {
            (Some(l), Some(r)) if l.container == r.container => self.insert_at(r, entry),
            (Some(l), _) if l.container == own => self.insert_at(after(l), entry),
            (_, Some(r)) if r.container == own => self.insert_at(r, entry),
            (left, right) => {
                let position = right.map_or(self.containers().len(), |r| r.container);
                let lower = left.map_or(0, |l| l.container);
                let reusable = own > lower && own < position && self.containers()[own].is_empty();
                if reusable && !self.containers()[own].is_pinned() {
                    self.containers_mut()[own].tabs.push(entry);
                } else {
                    self.insert_singleton(position, entry);
                }
            }
        }
    }

    fn fix_partition_boundary(&mut self) -> usize {
        let mut fixed = 0;

        let mut demoted = Vec::new();
        while self.containers()[0]
            .last()
            .is_some_and(|e| !e.pinned && !e.is_enroute())
        {
            if let Some(entry) = self.containers_mut()[0].tabs.pop() {
                demoted.push(entry);
            }
        }
        for entry in demoted {
            self.insert_singleton(1, entry);
            fixed += 1;
        }

        while let Some(first) = self.containers().get(1).and_then(Container::first) {
            if !first.pinned || first.is_enroute() {
                break;
            }
            let entry = self.containers_mut()[1].tabs.remove(0);
            self.containers_mut()[0].tabs.push(entry);
            if self.containers()[1].is_empty() {
                self.containers_mut().remove(1);
            }
            fixed += 1;
        }
        fixed
    }

    fn merge_marked_runs(&mut self) -> usize {
        let mut home: HashMap<TabId, usize> = HashMap::new();
        for (i, container) in self.containers().iter().enumerate() {
            for entry in container.tabs() {
                home.insert(entry.id, i);
            }
        }

        let mut merged = 0;
        let mut previous: Option<usize> = None;
        for i in 1..self.containers().len() {
            if let Some(prev) = previous {
                let run = self.containers()[i]
                    .tabs()
                    .iter()
                    .take_while(|e| {
                        !e.is_enroute()
                            && e.merge_target
                                .is_some_and(|t| t != e.id && home.get(&t) == Some(&prev))
                    })
                    .count();
                if run > 0 {
                    let moved: Vec<TabEntry> = self.containers_mut()[i].tabs.drain(..run).collect();
                    for entry in &moved {
                        home.insert(entry.id, prev);
                    }
                    merged += moved.len();
                    self.containers_mut()[prev].tabs.extend(moved);
                }
            }
            if !self.containers()[i].is_empty() {
                previous = Some(i);
            }
        }
        merged
    }

    fn unpinned_offset(&self, host_index: usize) -> usize {
        host_index
            .saturating_sub(self.pinned_count())
            .min(index::unpinned_count(self))
    }

    fn unpinned_neighbors(&self, u: usize) -> (Option<Location>, Option<Location>) {
        let left = u
            .checked_sub(1)
            .and_then(|n| index::unpinned_location(self, n));
        (left, index::unpinned_location(self, u))
    }

    fn insert_at(&mut self, loc: Location, entry: TabEntry) {
        let container = &mut self.containers_mut()[loc.container];
        container.tabs.insert(loc.slot, entry);
        container.normalize_kind();
    }

    fn insert_singleton(&mut self, position: usize, entry: TabEntry) -> ContainerId {
        let container = self.new_container(vec![entry]);
        let id = container.id();
        let position = position.clamp(1, self.containers().len());
        self.containers_mut().insert(position, container);
        id
    }

    fn take_entry(&mut self, id: TabId) -> Option<(usize, TabEntry)> {
        let loc = index::locate(self, id)?;
        let entry = self.containers_mut()[loc.container].tabs.remove(loc.slot);
        Some((loc.container, entry))
    }

    fn take_entries(&mut self, ids: &[TabId], keep: Option<TabId>) -> Vec<TabEntry> {
        ids.iter()
            .filter(|id| Some(**id) != keep)
            .filter_map(|&id| self.take_entry(id).map(|(_, entry)| entry))
            .collect()
    }
}

const fn after(loc: Location) -> Location {
    Location {
        container: loc.container,
        slot: loc.slot + 1,
    }
}
