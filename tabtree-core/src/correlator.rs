//! In-flight move bookkeeping
//!
//! A user operation that moves N tabs produces N independent moved-events.
//! The correlator records every requested move in one of two registries
//! (pinned space and unpinned space) indexed by the tab's origin index, and
//! groups them into batches. A batch is placed as a whole when it lands,
//! which happens at its first confirmation or earlier, when the engine next
//! reads positions from the tree. The last confirmation triggers a single
//! repair pass.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{BatchId, TabId};

/// Where the members of a batch belong once it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveIntent {
    /// Join the anchor's container, appended in batch order
    AppendTo(TabId),
    /// One singleton per member, placed before the container of `before`
    /// (at the end when `None`)
    Singletons {
        /// First tab of the container the singletons precede
        before: Option<TabId>,
    },
    /// Pinned segment, before `before` (at the end when `None`)
    Pinned {
        /// Pinned tab the members precede
        before: Option<TabId>,
    },
    /// No structural intent; fold each confirmation by host index
    InPlace,
}

/// One requested, unconfirmed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    /// Host index of the tab when the move was requested
    pub index: usize,
    /// Tab being moved
    pub tab_id: TabId,
    /// Final host index requested for the tab
    pub target_index: usize,
    /// Batch the move belongs to
    pub batch: BatchId,
}

/// Pending moves of one partition, indexed by origin index.
///
/// Several requests may share an origin index; they are kept side by side in
/// the same slot and told apart by tab id.
#[derive(Debug, Clone, Default)]
pub struct MoveRegistry {
    slots: Vec<Vec<PendingMove>>,
}

impl MoveRegistry {
    /// Records a pending move, superseding any earlier one for the same tab.
    pub fn register(&mut self, pending: PendingMove) {
        self.consume(pending.tab_id);
        if self.slots.len() <= pending.index {
            self.slots.resize_with(pending.index + 1, Vec::new);
        }
        self.slots[pending.index].push(pending);
    }

    /// Removes and returns the pending move of `tab`.
    pub fn consume(&mut self, tab: TabId) -> Option<PendingMove> {
        for slot in &mut self.slots {
            if let Some(pos) = slot.iter().position(|p| p.tab_id == tab) {
                let pending = slot.remove(pos);
                self.trim();
                return Some(pending);
            }
        }
        None
    }

    /// Removes every entry of `batch`, returned in origin-index order.
    pub fn take_batch(&mut self, batch: BatchId) -> Vec<PendingMove> {
        let mut taken = Vec::new();
        for slot in &mut self.slots {
            let (matching, rest): (Vec<_>, Vec<_>) = slot.drain(..).partition(|p| p.batch == batch);
            *slot = rest;
            taken.extend(matching);
        }
        self.trim();
        taken
    }

    /// Pending moves in origin-index order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingMove> {
        self.slots.iter().flatten()
    }

    /// Number of pending moves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn trim(&mut self) {
        while self.slots.last().is_some_and(Vec::is_empty) {
            self.slots.pop();
        }
    }
}

#[derive(Debug, Clone)]
struct Batch {
    intent: MoveIntent,
    pinned_space: bool,
    members: Vec<(usize, TabId)>,
    unconfirmed: Vec<TabId>,
    landed: bool,
}

/// Members of a batch handed out on its first confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
    /// Batch id
    pub batch: BatchId,
    /// Where the members belong
    pub intent: MoveIntent,
    /// Members ordered by requested target index, then request order
    pub members: Vec<TabId>,
}

/// Correlates moved-events with the operations that requested them.
#[derive(Debug, Clone, Default)]
pub struct MoveCorrelator {
    pinned: MoveRegistry,
    unpinned: MoveRegistry,
    batches: BTreeMap<BatchId, Batch>,
    next_batch: u64,
}

impl MoveCorrelator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a batch; its moves go to the pinned registry when `pinned_space`.
    pub fn begin_batch(&mut self, intent: MoveIntent, pinned_space: bool) -> BatchId {
        self.next_batch += 1;
        let id = BatchId(self.next_batch);
        self.batches.insert(
            id,
            Batch {
                intent,
                pinned_space,
                members: Vec::new(),
                unconfirmed: Vec::new(),
                landed: false,
            },
        );
        id
    }

    /// Id the next [`begin_batch`](Self::begin_batch) call will hand out.
    #[must_use]
    pub const fn next_batch_id(&self) -> BatchId {
        BatchId(self.next_batch + 1)
    }

    /// Records a move of `tab` from `origin` to `target` within `batch`.
    ///
    /// A move already pending for the tab is superseded. Registering into
    /// an unknown batch does nothing.
    pub fn register(&mut self, batch: BatchId, origin: usize, tab: TabId, target: usize) {
        if !self.batches.contains_key(&batch) {
            return;
        }
        self.consume(tab);
        self.detach_member(tab, Some(batch));

        let Some(entry) = self.batches.get_mut(&batch) else {
            return;
        };
        entry.members.retain(|(_, id)| *id != tab);
        entry.members.push((target, tab));
        entry.unconfirmed.retain(|id| *id != tab);
        entry.unconfirmed.push(tab);
        let pinned_space = entry.pinned_space;

        let pending = PendingMove {
            index: origin,
            tab_id: tab,
            target_index: target,
            batch,
        };
        if pinned_space {
            self.pinned.register(pending);
        } else {
            self.unpinned.register(pending);
        }
        debug!(tab = %tab, batch = %batch, origin, target, "Registered pending move");
    }

    /// Removes and returns the pending move of `tab`, if any.
    pub fn consume(&mut self, tab: TabId) -> Option<PendingMove> {
        self.unpinned
            .consume(tab)
            .or_else(|| self.pinned.consume(tab))
    }

    /// Hands out the batch of `primary` the first time one of its members
    /// lands.
    ///
    /// The remaining registry entries of the batch are cleared. Returns
    /// `None` when `primary` belongs to no batch or the batch already landed.
    pub fn drain_followers(&mut self, primary: TabId) -> Option<DrainedBatch> {
        let id = self
            .batches
            .iter()
            .find(|(_, b)| b.members.iter().any(|(_, tab)| *tab == primary))
            .map(|(id, _)| *id)?;
        let drained = self.land(id)?;
        debug!(batch = %id, primary = %primary, "Batch landed");
        Some(drained)
    }

    /// Hands out every structural batch that has not landed yet, oldest
    /// first.
    ///
    /// [`MoveIntent::InPlace`] batches are skipped; their confirmations are
    /// folded one by one.
    pub fn drain_ready(&mut self) -> Vec<DrainedBatch> {
        let ready: Vec<BatchId> = self
            .batches
            .iter()
            .filter(|(_, b)| !b.landed && b.intent != MoveIntent::InPlace)
            .map(|(id, _)| *id)
            .collect();
        ready.into_iter().filter_map(|id| self.land(id)).collect()
    }

    /// Intent of the batch `tab` belongs to.
    #[must_use]
    pub fn intent_of(&self, tab: TabId) -> Option<MoveIntent> {
        self.batch_of(tab).and_then(|id| self.batches.get(&id)).map(|b| b.intent)
    }

    /// Switches a batch to [`MoveIntent::InPlace`] so its remaining
    /// confirmations are folded by host index.
    pub fn downgrade(&mut self, batch: BatchId) {
        if let Some(entry) = self.batches.get_mut(&batch) {
            entry.intent = MoveIntent::InPlace;
        }
    }

    /// Batch whose confirmation of `tab` is still outstanding.
    #[must_use]
    pub fn batch_of(&self, tab: TabId) -> Option<BatchId> {
        self.batches
            .iter()
            .find(|(_, b)| b.unconfirmed.contains(&tab))
            .map(|(id, _)| *id)
    }

    /// Records the confirmation of `tab`.
    ///
    /// Returns the batch id once every member of its batch is confirmed;
    /// the batch is then forgotten.
    pub fn confirm(&mut self, tab: TabId) -> Option<BatchId> {
        self.detach_member(tab, None)
    }

    /// Drops every trace of `tab` (closed or detached while moving).
    ///
    /// Returns the batch id if this settled the batch.
    pub fn forget(&mut self, tab: TabId) -> Option<BatchId> {
        self.consume(tab);
        self.detach_member(tab, None)
    }

    /// Returns true when no batch is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of outstanding batches.
    #[must_use]
    pub fn open_batches(&self) -> usize {
        self.batches.len()
    }

    /// Pending moves of the pinned space.
    #[must_use]
    pub const fn pinned_registry(&self) -> &MoveRegistry {
        &self.pinned
    }

    /// Pending moves of the unpinned space.
    #[must_use]
    pub const fn unpinned_registry(&self) -> &MoveRegistry {
        &self.unpinned
    }

    /// Drops all batches and pending moves.
    pub fn clear(&mut self) {
        self.pinned.clear();
        self.unpinned.clear();
        self.batches.clear();
    }

    fn land(&mut self, id: BatchId) -> Option<DrainedBatch> {
        let batch = self.batches.get_mut(&id)?;
        if batch.landed {
            return None;
        }
        batch.landed = true;
        let mut members = batch.members.clone();
        members.sort_by_key(|(target, _)| *target);
        let intent = batch.intent;
        let registry = if batch.pinned_space {
            &mut self.pinned
        } else {
            &mut self.unpinned
        };
        let followers = registry.take_batch(id).len();
        debug!(batch = %id, followers, "Cleared pending moves of landed batch");
        Some(DrainedBatch {
            batch: id,
            intent,
            members: members.into_iter().map(|(_, tab)| tab).collect(),
        })
    }

    fn detach_member(&mut self, tab: TabId, except: Option<BatchId>) -> Option<BatchId> {
        let id = self
            .batches
            .iter()
            .find(|(id, b)| Some(**id) != except && b.unconfirmed.contains(&tab))
            .map(|(id, _)| *id)?;
        let batch = self.batches.get_mut(&id)?;
        batch.unconfirmed.retain(|t| *t != tab);
        if batch.unconfirmed.is_empty() {
            self.batches.remove(&id);
            self.pinned.take_batch(id);
            self.unpinned.take_batch(id);
            debug!(batch = %id, "Batch settled");
            return Some(id);
        }
        None
    }
}
