//! User-initiated batch operations
//!
//! Every operation validates the selection against the live tree, applies
//! what it can locally and asks the host for the remaining moves with a
//! single `move_tabs` call per batch. Batches requested earlier are landed
//! before the selection is read, and host targets are taken from the host's
//! own tab list, so several batches may be in flight at once. Convergence is
//! left to the moved-event handler and the
//! [`MoveCorrelator`](crate::correlator::MoveCorrelator).
//! A rejected host call is returned as [`GroupOpError::Host`]; optimistic
//! markers stay in place until the next authoritative event or a resync.

use tracing::{debug, instrument, warn};

use crate::correlator::MoveIntent;
use crate::error::{GroupOpError, GroupOpResult, TreeError};
use crate::models::{BatchId, ContainerId, HostTab, MoveTarget, TabId, TabState, TabUpdate};
use crate::sync::{SyncEngine, TreeChange};
use crate::tree::index;

/// Where dragged tabs are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// One singleton per tab, before the target's container
    Before(TabId),
    /// One singleton per tab, after the target's container
    After(TabId),
    /// Join the target's container at its end
    Into(TabId),
}

impl DropTarget {
    /// Tab the drop refers to.
    #[must_use]
    pub const fn tab(self) -> TabId {
        match self {
            Self::Before(id) | Self::After(id) | Self::Into(id) => id,
        }
    }
}

/// A host move still to be issued.
struct MovePlan {
    intent: MoveIntent,
    pinned_space: bool,
    tabs: Vec<TabId>,
    target: usize,
    merge_target: Option<TabId>,
}

impl SyncEngine {
    /// Groups the selection into one container, anchored at its first tab.
    ///
    /// The anchor is split out of its group first. Tabs sitting right after
    /// the anchor's container are appended locally; the rest are moved by the
    /// host as one block and join the anchor when their batch lands. The
    /// final order is the selection order.
    ///
    /// Returns the batch awaiting confirmation, or `None` when everything
    /// was done locally.
    ///
    /// # Errors
    ///
    /// - `GroupOpError::UnknownTab` / `PinnedTab` / `NotEnoughTabs` for an
    ///   invalid selection
    /// - `GroupOpError::Tree` when a selected tab already has a move pending
    /// - `GroupOpError::Host` when the host rejects the move
    #[instrument(name = "group.group_selected", skip_all, fields(tab_count = selection.len()))]
    pub async fn group_selected_tabs(&mut self, selection: &[TabId]) -> GroupOpResult<Option<BatchId>> {
        let tabs = self.checked_selection(selection)?;
        if let Some(pinned) = tabs.iter().find(|id| self.is_pinned(**id)) {
            return Err(GroupOpError::PinnedTab(*pinned));
        }
        if tabs.len() < 2 {
            return Err(GroupOpError::NotEnoughTabs {
                required: 2,
                found: tabs.len(),
            });
        }

        self.land_pending();
        let host_tabs = self.host_tabs().await?;

        let anchor = tabs[0];
        self.tree.split_out(anchor)?;
        let mut followers = tabs[1..].iter().copied().peekable();
        while let Some(&next) = followers.peek() {
            if index::visual_index(&self.tree, next) != Some(self.anchor_end(anchor)?) {
                break;
            }
            self.tree.apply_intent(&MoveIntent::AppendTo(anchor), &[next])?;
            if let Some(entry) = self.tree.entry_mut(next) {
                entry.merge_target = Some(anchor);
            }
            followers.next();
        }

        let moving: Vec<TabId> = followers.collect();
        if moving.is_empty() {
            debug!(anchor = %anchor, "Grouped locally");
            self.finish_local().await;
            return Ok(None);
        }
        let end = self.anchor_end(anchor)?;
        let (_, target) = host_target(&host_tabs, &moving, &self.unselected_from(end, &moving), false);
        self.issue_moves(MovePlan {
            intent: MoveIntent::AppendTo(anchor),
            pinned_space: false,
            tabs: moving,
            target,
            merge_target: Some(anchor),
        })
        .await
    }

    /// Takes the selected tabs out of their groups.
    ///
    /// Groups are handled in reverse visual order. A selected run at the end
    /// of a group is split off locally; the other selected tabs are moved by
    /// the host to just before the group's next sibling container, each
    /// ending up in its own singleton. Tabs that are not in a group are
    /// ignored.
    ///
    /// Returns one batch per group that needed host moves.
    ///
    /// # Errors
    ///
    /// - `GroupOpError::UnknownTab` / `PinnedTab` for an invalid selection
    /// - `GroupOpError::Tree` when a selected tab already has a move pending
    /// - `GroupOpError::Host` when the host rejects a move; earlier groups
    ///   keep their batches
    #[instrument(name = "group.detach", skip_all, fields(tab_count = selection.len()))]
    pub async fn detach_tabs_from_group(&mut self, selection: &[TabId]) -> GroupOpResult<Vec<BatchId>> {
        let tabs = self.checked_selection(selection)?;
        if let Some(pinned) = tabs.iter().find(|id| self.is_pinned(**id)) {
            return Err(GroupOpError::PinnedTab(*pinned));
        }

        let mut groups: Vec<usize> = tabs
            .iter()
            .filter_map(|id| index::locate(&self.tree, *id))
            .map(|loc| loc.container)
            .filter(|&c| self.tree.containers()[c].is_group())
            .collect();
        groups.sort_unstable();
        groups.dedup();
        let group_ids: Vec<ContainerId> = groups
            .iter()
            .rev()
            .map(|&c| self.tree.containers()[c].id())
            .collect();

        let mut batches = Vec::new();
        for id in group_ids {
            self.land_pending();
            let Some(position) = self.tree.container_index(id) else {
                continue;
            };
            let members = self.tree.containers()[position].tab_ids();
            let suffix = members.iter().rev().take_while(|m| tabs.contains(m)).count();
            let split_at = members.len() - suffix;
            let moving: Vec<TabId> = members[..split_at]
                .iter()
                .filter(|m| tabs.contains(m))
                .copied()
                .collect();
            let end = index::container_end(&self.tree, position);
            let (before, target) = if moving.is_empty() {
                (None, 0)
            } else {
                let host_tabs = self.host_tabs().await?;
                host_target(&host_tabs, &moving, &self.unselected_from(end, &[]), false)
            };

            for tail in members[split_at..].iter().rev() {
                self.tree.split_out(*tail)?;
            }
            debug!(container = %id, split = suffix, moving = moving.len(), "Detaching from group");

            let plan = MovePlan {
                intent: MoveIntent::Singletons { before },
                pinned_space: false,
                tabs: moving,
                target,
                merge_target: None,
            };
            if let Some(batch) = self.issue_moves(plan).await? {
                batches.push(batch);
            }
        }

        if batches.is_empty() {
            self.finish_local().await;
        }
        Ok(batches)
    }

    /// Replaces a group by one singleton per child. Host order is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `GroupOpError::Tree` with `ContainerNotFound` or `NotAGroup`.
    pub async fn ungroup_tabs(&mut self, container: ContainerId) -> GroupOpResult<Vec<ContainerId>> {
        self.land_pending();
        let created = self.tree.ungroup(container)?;
        debug!(container = %container, tabs = created.len(), "Ungrouped");
        self.finish_local().await;
        Ok(created)
    }

    /// Collapses a group.
    ///
    /// If the active tab is inside the group but not its first child, the
    /// first child is activated on the host first so the active tab is never
    /// hidden.
    ///
    /// # Errors
    ///
    /// Returns `GroupOpError::Tree` for a missing or non-group container and
    /// `GroupOpError::Host` when the activation is rejected.
    pub async fn collapse(&mut self, container: ContainerId) -> GroupOpResult<()> {
        let position = self
            .tree
            .container_index(container)
            .ok_or(TreeError::ContainerNotFound(container))?;
        let group = &self.tree.containers()[position];
        if !group.is_group() {
            return Err(TreeError::NotAGroup(container).into());
        }
        if group.is_collapsed() {
            return Ok(());
        }

        let first = group.first().map(|e| e.id);
        let hidden_active = self
            .tree
            .active()
            .filter(|active| group.contains(*active) && Some(*active) != first);
        if let (Some(active), Some(first)) = (hidden_active, first) {
            debug!(active = %active, first = %first, "Activating first child before collapsing");
            self.host
                .update_tab(first, TabUpdate::activate())
                .await
                .map_err(|source| GroupOpError::Host {
                    source,
                    pending: Vec::new(),
                })?;
            self.tree.set_active(Some(first));
            self.notify(TreeChange::Active(Some(first)));
        }

        self.tree.set_collapsed(container, true)?;
        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
        Ok(())
    }

    /// Expands a group.
    ///
    /// # Errors
    ///
    /// Returns `GroupOpError::Tree` for a missing or non-group container.
    pub async fn expand(&mut self, container: ContainerId) -> GroupOpResult<()> {
        self.tree.set_collapsed(container, false)?;
        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
        Ok(())
    }

    /// Collapses an expanded group or expands a collapsed one.
    ///
    /// Returns the new collapsed state.
    ///
    /// # Errors
    ///
    /// Same as [`collapse`](Self::collapse) and [`expand`](Self::expand).
    pub async fn toggle_collapse(&mut self, container: ContainerId) -> GroupOpResult<bool> {
        let collapsed = self
            .tree
            .container(container)
            .ok_or(TreeError::ContainerNotFound(container))?
            .is_collapsed();
        if collapsed {
            self.expand(container).await?;
        } else {
            self.collapse(container).await?;
        }
        Ok(!collapsed)
    }

    /// Drags the selection onto `target`.
    ///
    /// The selection moves in visual order as one host block. Pinned tabs can
    /// only be dropped among pinned tabs, where `Into` behaves like `After`.
    ///
    /// # Errors
    ///
    /// - `GroupOpError::UnknownTab` / `DropOntoSelf` / `MixedPartitions` /
    ///   `NotEnoughTabs` for an invalid drop
    /// - `GroupOpError::Tree` when a selected tab already has a move pending
    /// - `GroupOpError::Host` when the host rejects the move
    #[instrument(name = "group.move_to", skip_all, fields(tab_count = selection.len(), target = ?target))]
    pub async fn move_tabs_to(&mut self, selection: &[TabId], target: DropTarget) -> GroupOpResult<Option<BatchId>> {
        let mut tabs = self.checked_selection(selection)?;
        let anchor = target.tab();
        if tabs.contains(&anchor) {
            return Err(GroupOpError::DropOntoSelf(anchor));
        }
        let pinned = self
            .tree
            .entry(anchor)
            .ok_or(GroupOpError::UnknownTab(anchor))?
            .pinned;
        if tabs.is_empty() {
            return Err(GroupOpError::NotEnoughTabs {
                required: 1,
                found: 0,
            });
        }
        if tabs.iter().any(|id| self.is_pinned(*id) != pinned) {
            return Err(GroupOpError::MixedPartitions);
        }
        self.land_pending();
        tabs.sort_by_key(|id| index::visual_index(&self.tree, *id));
        let host_tabs = self.host_tabs().await?;

        let loc = index::locate(&self.tree, anchor).ok_or(TreeError::TabNotFound(anchor))?;
        let boundary = if pinned {
            let at = index::container_start(&self.tree, 0) + loc.slot;
            match target {
                DropTarget::Before(_) => at,
                DropTarget::After(_) | DropTarget::Into(_) => at + 1,
            }
        } else {
            match target {
                DropTarget::Before(_) => index::container_start(&self.tree, loc.container),
                DropTarget::After(_) | DropTarget::Into(_) => index::container_end(&self.tree, loc.container),
            }
        };
        let mut candidates = self.unselected_from(boundary, &tabs);
        if pinned {
            candidates.retain(|id| self.is_pinned(*id));
        }
        let (before, target_index) = host_target(&host_tabs, &tabs, &candidates, pinned);
        let (intent, merge_target) = match target {
            _ if pinned => (MoveIntent::Pinned { before }, None),
            DropTarget::Into(_) => (MoveIntent::AppendTo(anchor), Some(anchor)),
            DropTarget::Before(_) | DropTarget::After(_) => (MoveIntent::Singletons { before }, None),
        };

        self.issue_moves(MovePlan {
            intent,
            pinned_space: pinned,
            tabs,
            target: target_index,
            merge_target,
        })
        .await
    }

    /// Pins or unpins the selection through the host.
    ///
    /// The structural change arrives later as updated-events. Tabs are
    /// updated in an order that keeps their relative order across the
    /// partition boundary. Returns the number of tabs whose state changed.
    ///
    /// # Errors
    ///
    /// Returns `GroupOpError::UnknownTab`, `GroupOpError::Tree` for a tab
    /// with a pending move, or `GroupOpError::Host` on the first rejected
    /// update.
    pub async fn set_pinned(&mut self, selection: &[TabId], pinned: bool) -> GroupOpResult<usize> {
        let mut tabs = self.checked_selection(selection)?;
        tabs.retain(|id| self.is_pinned(*id) != pinned);
        tabs.sort_by_key(|id| index::visual_index(&self.tree, *id));
        if !pinned {
            tabs.reverse();
        }
        for id in &tabs {
            self.host
                .update_tab(*id, TabUpdate::pinned(pinned))
                .await
                .map_err(|source| {
                    warn!(tab = %id, error = %source, "Pin change rejected");
                    GroupOpError::Host {
                        source,
                        pending: Vec::new(),
                    }
                })?;
        }
        Ok(tabs.len())
    }

    /// Deduplicated selection in the given order; every tab must be known
    /// and settled.
    fn checked_selection(&self, selection: &[TabId]) -> GroupOpResult<Vec<TabId>> {
        let mut tabs: Vec<TabId> = Vec::with_capacity(selection.len());
        for id in selection {
            let entry = self.tree.entry(*id).ok_or(GroupOpError::UnknownTab(*id))?;
            if entry.is_enroute() {
                return Err(TreeError::IllegalTransition {
                    tab: *id,
                    from: entry.state(),
                    to: TabState::PendingMove(self.correlator.next_batch_id()),
                }
                .into());
            }
            if !tabs.contains(id) {
                tabs.push(*id);
            }
        }
        Ok(tabs)
    }

    fn is_pinned(&self, id: TabId) -> bool {
        self.tree.entry(id).is_some_and(|e| e.pinned)
    }

    /// Visual index one past the anchor's container.
    fn anchor_end(&self, anchor: TabId) -> GroupOpResult<usize> {
        let loc = index::locate(&self.tree, anchor).ok_or(TreeError::TabNotFound(anchor))?;
        Ok(index::container_end(&self.tree, loc.container))
    }

    /// Tabs from visual index `visual` onwards, in order, leaving out
    /// `selection`.
    fn unselected_from(&self, visual: usize, selection: &[TabId]) -> Vec<TabId> {
        (visual..self.tree.len())
            .filter_map(|v| index::external_id_at(&self.tree, v))
            .filter(|id| !selection.contains(id))
            .collect()
    }

    /// The host's tab list in host order.
    async fn host_tabs(&self) -> GroupOpResult<Vec<HostTab>> {
        let mut tabs = self
            .host
            .query_all_tabs(self.window_id)
            .await
            .map_err(|source| GroupOpError::Host {
                source,
                pending: Vec::new(),
            })?;
        tabs.sort_by_key(|t| t.index);
        Ok(tabs)
    }

    async fn finish_local(&mut self) {
        self.tree.repair();
        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
    }

    /// Marks the plan's tabs enroute, registers them and asks the host to
    /// move them as one block.
    async fn issue_moves(&mut self, plan: MovePlan) -> GroupOpResult<Option<BatchId>> {
        if plan.tabs.is_empty() {
            return Ok(None);
        }
        let batch = self.correlator.begin_batch(plan.intent, plan.pinned_space);
        for (offset, id) in plan.tabs.iter().enumerate() {
            let origin = index::visual_index(&self.tree, *id).ok_or(TreeError::TabNotFound(*id))?;
            self.correlator.register(batch, origin, *id, plan.target + offset);
            if let Some(entry) = self.tree.entry_mut(*id) {
                entry.begin_move(batch)?;
                entry.merge_target = plan.merge_target;
            }
        }
        self.notify(TreeChange::Structure);

        let result = self
            .host
            .move_tabs(&plan.tabs, MoveTarget::at(self.window_id, plan.target))
            .await;
        match result {
            Ok(_) => {
                debug!(batch = %batch, tabs = plan.tabs.len(), target = plan.target, "Requested batch move");
                Ok(Some(batch))
            }
            Err(source) => {
                warn!(batch = %batch, error = %source, "Host rejected batch move");
                self.correlator.downgrade(batch);
                Err(GroupOpError::Host {
                    source,
                    pending: plan.tabs,
                })
            }
        }
    }
}

/// Where a block of `moving` tabs goes on the host: right before the first
/// of `candidates` the host still has, or at the end of the partition.
///
/// The index counts the host's tabs with the block taken out, which is what
/// a block move expects. Returns the reference tab too.
fn host_target(host_tabs: &[HostTab], moving: &[TabId], candidates: &[TabId], pinned: bool) -> (Option<TabId>, usize) {
    let rest: Vec<&HostTab> = host_tabs.iter().filter(|t| !moving.contains(&t.id)).collect();
    candidates
        .iter()
        .find_map(|id| rest.iter().position(|t| t.id == *id).map(|at| (Some(*id), at)))
        .unwrap_or_else(|| {
            let end = if pinned {
                rest.iter().filter(|t| t.pinned).count()
            } else {
                rest.len()
            };
            (None, end)
        })
}
