//! Event handlers and window lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::config::SidebarSettings;
use crate::correlator::{MoveCorrelator, MoveIntent};
use crate::error::{SyncResult, TreeError};
use crate::host::{HostEvent, TabHost};
use crate::models::{ChangeInfo, ContainerId, HostTab, MoveTarget, TabEntry, TabId, WindowId};
use crate::snapshot::SessionSnapshot;
use crate::trace_operation;
use crate::tracing::span_names;
use crate::tree::{RepairReport, TabTree, index};

/// Notification sent to subscribers after the tree changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    /// Containers or their order changed
    Structure,
    /// Cosmetic fields of a tab changed
    Tab(TabId),
    /// The active tab changed
    Active(Option<TabId>),
    /// The highlighted set changed
    Highlight,
    /// A session snapshot was written
    SnapshotWritten {
        /// Number of recorded positions
        positions: usize,
    },
}

/// Keeps one window's visual tree synchronized with the host.
pub struct SyncEngine {
    pub(crate) window_id: WindowId,
    pub(crate) incognito: bool,
    pub(crate) tree: TabTree,
    pub(crate) correlator: MoveCorrelator,
    pub(crate) host: Arc<dyn TabHost>,
    pub(crate) settings: SidebarSettings,
    listeners: Vec<mpsc::UnboundedSender<TreeChange>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("window_id", &self.window_id)
            .field("incognito", &self.incognito)
            .field("tree", &self.tree.describe())
            .field("open_batches", &self.correlator.open_batches())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine with an empty tree.
    #[must_use]
    pub fn new(host: Arc<dyn TabHost>, window_id: WindowId, incognito: bool, settings: SidebarSettings) -> Self {
        Self {
            window_id,
            incognito,
            tree: TabTree::new(window_id),
            correlator: MoveCorrelator::new(),
            host,
            settings,
            listeners: Vec::new(),
        }
    }

    /// Builds the tree of the host's current window.
    ///
    /// Entries are emulated from the host tab list, laid out by the stored
    /// snapshot where it still matches, then settled by a repair pass.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Host` when the window cannot be read. A missing
    /// or unreadable snapshot is not an error.
    pub async fn load(host: Arc<dyn TabHost>, settings: SidebarSettings) -> SyncResult<Self> {
        let window = host.current_window(true).await?;
        let tabs = match window.tabs {
            Some(tabs) => tabs,
            None => host.query_all_tabs(window.id).await?,
        };
        let mut engine = Self::new(host, window.id, window.incognito, settings);
        engine
            .populate(tabs)
            .instrument(trace_operation!(span_names::SYNC_LOAD, window_id = %window.id))
            .await;
        Ok(engine)
    }

    /// Window this engine mirrors.
    #[must_use]
    pub const fn window_id(&self) -> WindowId {
        self.window_id
    }

    /// Whether the window is private.
    #[must_use]
    pub const fn is_incognito(&self) -> bool {
        self.incognito
    }

    /// The visual tree.
    #[must_use]
    pub const fn tree(&self) -> &TabTree {
        &self.tree
    }

    /// Pending-move bookkeeping.
    #[must_use]
    pub const fn correlator(&self) -> &MoveCorrelator {
        &self.correlator
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &SidebarSettings {
        &self.settings
    }

    /// The host this engine talks to.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }

    /// Entry of a tab by host id.
    #[must_use]
    pub fn lookup(&self, id: TabId) -> Option<&TabEntry> {
        self.tree.entry(id)
    }

    /// Entry at a flat visual index.
    #[must_use]
    pub fn lookup_at(&self, visual: usize) -> Option<&TabEntry> {
        index::entry_at(&self.tree, visual)
    }

    /// Registers a listener for tree changes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    /// Dispatches one host event to its handler.
    ///
    /// # Errors
    ///
    /// Propagates handler errors (host query failures, unknown tabs in
    /// structural operations).
    pub async fn handle_event(&mut self, event: HostEvent) -> SyncResult<()> {
        debug!(event = event.name(), tab = ?event.tab_id(), "Handling host event");
        match event {
            HostEvent::Created { tab } => self.on_created(tab).await,
            HostEvent::Attached {
                tab_id,
                new_position,
                new_window_id,
            } => self.on_attached(tab_id, new_position, new_window_id).await,
            HostEvent::Detached {
                tab_id,
                old_window_id,
            } => self.on_detached(tab_id, old_window_id).await,
            HostEvent::Moved {
                tab_id,
                from_index,
                to_index,
                window_id,
            } => self.on_moved(tab_id, from_index, to_index, window_id).await,
            HostEvent::Removed {
                tab_id,
                window_id,
                is_window_closing,
            } => self.on_removed(tab_id, window_id, is_window_closing).await,
            HostEvent::Updated { tab_id, change, tab } => self.on_updated(tab_id, change, tab).await,
            HostEvent::Activated { tab_id, window_id } => {
                self.on_activated(tab_id, window_id).await;
                Ok(())
            }
            HostEvent::Highlighted { tab_ids, window_id } => {
                self.on_highlighted(&tab_ids, window_id);
                Ok(())
            }
        }
    }

    /// Places a newly created tab.
    ///
    /// Pinned tabs go to the pinned segment, tabs with an unpinned opener
    /// join the opener's container, everything else is placed by its
    /// neighbours.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Tree` if the opener vanished mid-placement.
    #[instrument(name = "sync.on_created", skip_all, fields(tab_id = %tab.id, index = tab.index))]
    pub async fn on_created(&mut self, tab: HostTab) -> SyncResult<()> {
        if tab.window_id != self.window_id || tab.id.is_none() {
            debug!("Ignoring tab of another window");
            return Ok(());
        }
        if self.tree.contains(tab.id) {
            debug!("Tab already known");
            return Ok(());
        }
        self.land_pending();

        let entry = TabEntry::from_host(&tab);
        let opener = tab
            .opener_tab_id
            .filter(|o| self.tree.entry(*o).is_some_and(|e| !e.pinned));
        if tab.pinned {
            self.tree.place_in_pinned(entry, tab.index);
        } else if let Some(opener) = opener {
            let placement = self.tree.place_after_opener(
                entry,
                opener,
                tab.index,
                self.settings.group_new_tabs_at_end,
            )?;
            if let Some(target) = placement.follow_up {
                self.request_follow_up(tab.id, opener, tab.index, target).await?;
            }
        } else {
            self.tree.place_by_neighbor_heuristic(entry, tab.index);
        }
        self.reconcile_with_host().await;
        self.notify(TreeChange::Structure);

        if tab.active {
            self.on_activated(tab.id, tab.window_id).await;
        }
        self.persist_snapshot().await;
        Ok(())
    }

    /// A tab arrived from another window; modelled as a creation at
    /// `new_position`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Host` when the tab record cannot be read.
    #[instrument(name = "sync.on_attached", skip_all, fields(tab_id = %tab_id, new_position))]
    pub async fn on_attached(&mut self, tab_id: TabId, new_position: usize, new_window_id: WindowId) -> SyncResult<()> {
        if new_window_id != self.window_id {
            return Ok(());
        }
        let mut tab = self.host.query_tab(tab_id).await?;
        tab.index = new_position;
        tab.window_id = new_window_id;
        self.on_created(tab).await
    }

    /// A tab left for another window.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other handlers.
    #[instrument(name = "sync.on_detached", skip_all, fields(tab_id = %tab_id))]
    pub async fn on_detached(&mut self, tab_id: TabId, old_window_id: WindowId) -> SyncResult<()> {
        if old_window_id == self.window_id {
            self.drop_tab(tab_id).await;
        }
        Ok(())
    }

    /// A tab was closed. Ignored while the whole window is closing.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other handlers.
    #[instrument(name = "sync.on_removed", skip_all, fields(tab_id = %tab_id, is_window_closing))]
    pub async fn on_removed(&mut self, tab_id: TabId, window_id: WindowId, is_window_closing: bool) -> SyncResult<()> {
        if window_id == self.window_id && !is_window_closing {
            self.drop_tab(tab_id).await;
        }
        Ok(())
    }

    /// Folds a moved-event.
    ///
    /// Confirmations of locally requested moves are matched through the
    /// correlator: every batch not yet landed is placed first, the last
    /// confirmation of a batch triggers its single repair pass. Host-initiated
    /// moves are folded by index and followed by a repair pass. A move of an
    /// unknown tab the host no longer has is ignored.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Tree` if the tree loses the tab mid-fold.
    #[instrument(name = "sync.on_moved", skip_all, fields(tab_id = %tab_id, from_index, to_index))]
    pub async fn on_moved(&mut self, tab_id: TabId, from_index: usize, to_index: usize, window_id: WindowId) -> SyncResult<()> {
        if window_id != self.window_id {
            return Ok(());
        }
        if !self.tree.contains(tab_id) {
            let mut tab = match self.host.query_tab(tab_id).await {
                Ok(tab) => tab,
                Err(e) => {
                    debug!(error = %e, "Move of a tab the host no longer has");
                    return Ok(());
                }
            };
            if tab.window_id != self.window_id {
                return Ok(());
            }
            debug!("Move of a tab not yet created");
            tab.index = to_index;
            return self.on_created(tab).await;
        }

        let pinned = match self.host.query_tab(tab_id).await {
            Ok(tab) => tab.pinned,
            Err(e) => {
                warn!(error = %e, "Could not read pinned state, keeping local value");
                self.tree.entry(tab_id).is_some_and(|entry| entry.pinned)
            }
        };
        let Some(entry) = self.tree.entry(tab_id) else {
            return Ok(());
        };

        if entry.is_enroute() {
            self.confirm_move(tab_id, from_index, to_index, pinned).await?;
        } else {
            self.land_pending();
            self.tree.apply_move(tab_id, from_index, to_index, pinned)?;
            if let Some(entry) = self.tree.entry_mut(tab_id) {
                entry.clear_markers();
            }
            self.tree.repair();
            self.reconcile_with_host().await;
            self.notify(TreeChange::Structure);
            self.persist_snapshot().await;
        }
        Ok(())
    }

    /// Applies property changes.
    ///
    /// A pinned-state change moves the entry across the partition boundary
    /// and always runs a repair pass. An enroute or restoring entry whose
    /// visual slot already matches the host index is settled.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Tree` if the entry disappears mid-update.
    #[instrument(name = "sync.on_updated", skip_all, fields(tab_id = %tab_id))]
    pub async fn on_updated(&mut self, tab_id: TabId, change: ChangeInfo, tab: HostTab) -> SyncResult<()> {
        if tab.window_id != self.window_id {
            return Ok(());
        }
        let Some(entry) = self.tree.entry_mut(tab_id) else {
            debug!("Update for unknown tab");
            return Ok(());
        };
        let url_changed = change.url.is_some();
        if let Some(url) = change.url {
            entry.url = url;
        }
        if let Some(title) = change.title {
            entry.title = title;
        }
        if let Some(muted) = change.muted {
            entry.muted = muted;
        }

        self.land_pending();
        let current = index::visual_index(&self.tree, tab_id).ok_or(TreeError::TabNotFound(tab_id))?;
        let mut structural = false;
        if let Some(pinned) = change.pinned {
            if let Some(entry) = self.tree.entry_mut(tab_id) {
                entry.mark_restore();
            }
            self.tree.apply_move(tab_id, current, tab.index, pinned)?;
            self.tree.repair();
            self.reconcile_with_host().await;
            structural = true;
        } else if self.tree.entry(tab_id).is_some_and(|e| !e.state().is_stable())
            && current == tab.index
        {
            if let Some(entry) = self.tree.entry_mut(tab_id) {
                entry.clear_markers();
            }
            debug!("Cleared stale marker");
            if self.correlator.forget(tab_id).is_some() {
                self.tree.repair();
                self.reconcile_with_host().await;
            }
            structural = true;
        }

        if structural {
            self.notify(TreeChange::Structure);
        } else {
            self.notify(TreeChange::Tab(tab_id));
        }
        if structural || url_changed {
            self.persist_snapshot().await;
        }
        Ok(())
    }

    /// Tracks the active tab, expanding its collapsed group if configured.
    #[instrument(skip_all, fields(tab_id = %tab_id))]
    pub async fn on_activated(&mut self, tab_id: TabId, window_id: WindowId) {
        if window_id != self.window_id || !self.tree.contains(tab_id) {
            return;
        }
        self.tree.set_active(Some(tab_id));
        self.notify(TreeChange::Active(Some(tab_id)));

        if !self.settings.expand_on_activate {
            return;
        }
        let Some(loc) = index::locate(&self.tree, tab_id) else {
            return;
        };
        let container = &self.tree.containers()[loc.container];
        if container.is_collapsed() && loc.slot > 0 {
            let id = container.id();
            if self.tree.set_collapsed(id, false).is_ok() {
                debug!(container = %id, "Expanded group of activated tab");
                self.notify(TreeChange::Structure);
                self.persist_snapshot().await;
            }
        }
    }

    /// Mirrors the host's highlighted set.
    pub fn on_highlighted(&mut self, tab_ids: &[TabId], window_id: WindowId) {
        if window_id != self.window_id {
            return;
        }
        for entry in self.tree.entries_mut() {
            entry.highlighted = tab_ids.contains(&entry.id);
        }
        self.notify(TreeChange::Highlight);
    }

    /// Rebuilds the tree from the host's tab list.
    ///
    /// Runs of tabs that are still contiguous and shared a container keep
    /// it (and its collapsed flag); every other tab becomes a singleton.
    /// Pending moves and all markers are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Host` when the tab list cannot be read.
    pub async fn resync(&mut self) -> SyncResult<()> {
        let span = trace_operation!(span_names::SYNC_RESYNC, window_id = %self.window_id);
        self.rebuild_from_host().instrument(span).await
    }

    /// Writes the session snapshot if enabled, the window is not private
    /// and no move is in flight. Storage failures are logged and ignored.
    pub async fn persist_snapshot(&mut self) {
        if !self.settings.persist_snapshots || !self.correlator.is_idle() {
            return;
        }
        let Some(snapshot) = SessionSnapshot::capture(&self.tree, self.incognito) else {
            return;
        };
        let positions = snapshot.len();
        let result = snapshot
            .write_to(self.host.as_ref(), &self.settings.snapshot_key, self.window_id)
            .instrument(trace_operation!(span_names::SNAPSHOT_PERSIST, positions))
            .await;
        match result {
            Ok(()) => self.notify(TreeChange::SnapshotWritten { positions }),
            Err(e) => warn!(error = %e, "Failed to write session snapshot"),
        }
    }

    pub(crate) fn notify(&mut self, change: TreeChange) {
        self.listeners.retain(|tx| tx.send(change.clone()).is_ok());
    }

    async fn rebuild_from_host(&mut self) -> SyncResult<()> {
        let tabs = self.host.query_all_tabs(self.window_id).await?;
        let report = self.rebuild_from(&tabs);
        info!(tabs = tabs.len(), pruned = report.pruned, "Resynchronized with host");

        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
        Ok(())
    }

    /// Replaces the tree by the host's tab list, keeping runs that are still
    /// contiguous in their container.
    fn rebuild_from(&mut self, tabs: &[HostTab]) -> RepairReport {
        let mut membership: HashMap<TabId, ContainerId> = HashMap::new();
        let mut collapsed: HashMap<ContainerId, bool> = HashMap::new();
        for container in self.tree.unpinned() {
            collapsed.insert(container.id(), container.is_collapsed());
            for entry in container.tabs() {
                membership.insert(entry.id, container.id());
            }
        }

        let (pinned, unpinned) = split_partitions(tabs);
        let mut groups: Vec<(Vec<TabEntry>, bool)> = Vec::new();
        let mut last: Option<ContainerId> = None;
        for tab in unpinned {
            let mut entry = TabEntry::from_host(tab);
            if let Some(old) = self.tree.entry(tab.id) {
                entry.title.clone_from(&old.title);
            }
            let home = membership.get(&tab.id).copied();
            match (home, groups.last_mut()) {
                (Some(home), Some((tabs, _))) if last == Some(home) => tabs.push(entry),
                _ => {
                    let flag = home.and_then(|h| collapsed.get(&h).copied()).unwrap_or(false);
                    groups.push((vec![entry], flag));
                }
            }
            last = home;
        }

        self.correlator.clear();
        self.tree.rebuild(pinned.into_iter().map(TabEntry::from_host).collect(), groups);
        self.tree
            .set_active(tabs.iter().find(|t| t.active).map(|t| t.id));
        self.tree.repair()
    }

    /// Places every batch that has not landed yet, oldest first.
    ///
    /// Runs before the tree's positions are read or changed, so each request
    /// and each folded event sees the batches requested before it in place.
    /// A batch whose target is gone is downgraded and folded by index.
    pub(crate) fn land_pending(&mut self) {
        for drained in self.correlator.drain_ready() {
            if let Err(e) = self.tree.apply_intent(&drained.intent, &drained.members) {
                warn!(error = %e, batch = %drained.batch, "Batch target vanished, folding by index");
                self.correlator.downgrade(drained.batch);
            }
        }
    }

    /// Rebuilds the tree from the host when nothing is in flight and the
    /// two disagree on order or partition.
    ///
    /// Skipped while host events for created or closed tabs are still
    /// queued. Does not notify or persist; callers do.
    async fn reconcile_with_host(&mut self) {
        if !self.correlator.is_idle() {
            return;
        }
        let tabs = match self.host.query_all_tabs(self.window_id).await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(error = %e, "Could not read host order for reconciliation");
                return;
            }
        };
        let (pinned, unpinned) = split_partitions(&tabs);
        let host_ids: Vec<TabId> = pinned.iter().chain(&unpinned).map(|t| t.id).collect();
        let local_ids = self.tree.tab_ids();
        if host_ids == local_ids && pinned.len() == self.tree.pinned_count() {
            return;
        }
        let mut sorted_host = host_ids;
        let mut sorted_local = local_ids;
        sorted_host.sort_unstable();
        sorted_local.sort_unstable();
        if sorted_host != sorted_local {
            debug!("Host events still queued, reconciliation deferred");
            return;
        }
        let report = self.rebuild_from(&tabs);
        warn!(tabs = tabs.len(), pruned = report.pruned, "Tree order drifted from host, rebuilt");
    }

    async fn populate(&mut self, tabs: Vec<HostTab>) {
        let (pinned, unpinned) = split_partitions(&tabs);
        let restoring = |tab: &HostTab| {
            let mut entry = TabEntry::from_host(tab);
            entry.mark_restore();
            entry
        };
        let pinned: Vec<TabEntry> = pinned.into_iter().map(restoring).collect();
        let unpinned: Vec<TabEntry> = unpinned.into_iter().map(restoring).collect();

        let snapshot = match SessionSnapshot::read_from(
            self.host.as_ref(),
            &self.settings.snapshot_key,
            self.window_id,
        )
        .instrument(trace_operation!(span_names::SNAPSHOT_RESTORE))
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session snapshot");
                None
            }
        };
        let groups = match snapshot {
            Some(snapshot) => {
                let layout = snapshot.restore(unpinned);
                debug!(matched = layout.matched, "Applied session snapshot");
                layout.groups
            }
            None => unpinned.into_iter().map(|e| (vec![e], false)).collect(),
        };

        self.tree.rebuild(pinned, groups);
        self.tree
            .set_active(tabs.iter().find(|t| t.active).map(|t| t.id));
        let report = self.tree.repair();
        info!(tabs = tabs.len(), settled = report.settled, "Loaded window");
        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
    }

    async fn drop_tab(&mut self, tab_id: TabId) {
        if !self.tree.contains(tab_id) {
            debug!(tab = %tab_id, "Removal of unknown tab");
            return;
        }
        self.land_pending();
        self.tree.remove_tab(tab_id);
        if let Some(batch) = self.correlator.forget(tab_id) {
            debug!(batch = %batch, "Batch settled by removal");
            self.tree.repair();
        }
        self.reconcile_with_host().await;
        self.notify(TreeChange::Structure);
        self.persist_snapshot().await;
    }

    async fn confirm_move(&mut self, tab_id: TabId, from: usize, to: usize, pinned: bool) -> SyncResult<()> {
        let pending = self.correlator.consume(tab_id);
        self.land_pending();
        if matches!(self.correlator.intent_of(tab_id), Some(MoveIntent::InPlace) | None) {
            self.tree.apply_move(tab_id, from, to, pinned)?;
        }
        if let Some(entry) = self.tree.entry_mut(tab_id) {
            entry.clear_markers();
        }
        debug!(origin = ?pending.map(|p| p.index), "Confirmed requested move");

        if let Some(batch) = self.correlator.confirm(tab_id) {
            let report = self.tree.repair();
            debug!(batch = %batch, merged = report.merged, "Batch complete");
            self.reconcile_with_host().await;
            self.notify(TreeChange::Structure);
            self.persist_snapshot().await;
        } else {
            self.notify(TreeChange::Structure);
        }
        Ok(())
    }

    /// Moves a tab opened into its opener's container to the host index
    /// matching its visual slot. On rejection the tab is folded back to
    /// where the host has it.
    async fn request_follow_up(&mut self, id: TabId, opener: TabId, origin: usize, target: usize) -> SyncResult<()> {
        let batch = self.correlator.begin_batch(MoveIntent::InPlace, false);
        self.correlator.register(batch, origin, id, target);
        if let Some(entry) = self.tree.entry_mut(id) {
            entry.begin_move(batch)?;
            entry.merge_target = Some(opener);
        }
        let result = self
            .host
            .move_tabs(&[id], MoveTarget::at(self.window_id, target))
            .await;
        if let Err(e) = result {
            warn!(tab = %id, error = %e, "Follow-up move rejected");
            self.correlator.forget(id);
            if let Some(entry) = self.tree.entry_mut(id) {
                entry.clear_markers();
            }
            self.tree.apply_move(id, target, origin, false)?;
        }
        Ok(())
    }
}

fn split_partitions(tabs: &[HostTab]) -> (Vec<&HostTab>, Vec<&HostTab>) {
    let mut ordered: Vec<&HostTab> = tabs.iter().collect();
    ordered.sort_by_key(|t| t.index);
    ordered.into_iter().partition(|t| t.pinned)
}
