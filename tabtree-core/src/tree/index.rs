//! Position lookups over the live tree
//!
//! Nothing here is cached. Every function walks the current containers, so
//! callers re-derive positions after each host call instead of carrying
//! indices across a suspension point.

use crate::models::{Container, TabEntry, TabId};

use super::TabTree;

/// Address of an entry: container position plus slot within that container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Position in the container list (0 is the pinned segment)
    pub container: usize,
    /// Position within the container
    pub slot: usize,
}

/// Finds the container and slot holding `id`.
#[must_use]
pub fn locate(tree: &TabTree, id: TabId) -> Option<Location> {
    tree.containers()
        .iter()
        .enumerate()
        .find_map(|(container, c)| c.position(id).map(|slot| Location { container, slot }))
}

/// Position of `id` in the flat visual sequence.
#[must_use]
pub fn visual_index(tree: &TabTree, id: TabId) -> Option<usize> {
    let mut offset = 0;
    for container in tree.containers() {
        if let Some(slot) = container.position(id) {
            return Some(offset + slot);
        }
        offset += container.len();
    }
    None
}

/// Visual index of the first entry of the container at position `container`.
#[must_use]
pub fn container_start(tree: &TabTree, container: usize) -> usize {
    tree.containers()
        .iter()
        .take(container)
        .map(Container::len)
        .sum()
}

/// Visual index one past the last entry of the container at `container`.
#[must_use]
pub fn container_end(tree: &TabTree, container: usize) -> usize {
    container_start(tree, container)
        + tree.containers().get(container).map_or(0, Container::len)
}

/// Address of the entry at a flat visual index.
#[must_use]
pub fn location_at(tree: &TabTree, visual: usize) -> Option<Location> {
    let mut remaining = visual;
    for (container, c) in tree.containers().iter().enumerate() {
        if remaining < c.len() {
            return Some(Location {
                container,
                slot: remaining,
            });
        }
        remaining -= c.len();
    }
    None
}

/// Entry at a flat visual index.
#[must_use]
pub fn entry_at(tree: &TabTree, visual: usize) -> Option<&TabEntry> {
    location_at(tree, visual).map(|loc| &tree.containers()[loc.container].tabs()[loc.slot])
}

/// Host id of the entry at a flat visual index.
#[must_use]
pub fn external_id_at(tree: &TabTree, visual: usize) -> Option<TabId> {
    entry_at(tree, visual).map(|e| e.id)
}

/// Container holding `id`.
#[must_use]
pub fn container_of(tree: &TabTree, id: TabId) -> Option<&Container> {
    locate(tree, id).map(|loc| &tree.containers()[loc.container])
}

/// Address of the `n`th unpinned entry.
#[must_use]
pub fn unpinned_location(tree: &TabTree, n: usize) -> Option<Location> {
    location_at(tree, tree.pinned_count() + n)
}

/// Number of unpinned entries.
#[must_use]
pub fn unpinned_count(tree: &TabTree) -> usize {
    tree.len() - tree.pinned_count()
}

/// Ids in flat visual order.
#[must_use]
pub fn flat_ids(tree: &TabTree) -> Vec<TabId> {
    tree.tab_ids()
}
