//! Folding host events into the tree
//!
//! [`SyncEngine`] owns one window's [`TabTree`](crate::tree::TabTree) and
//! [`MoveCorrelator`](crate::correlator::MoveCorrelator). Handlers run one at
//! a time through `&mut self`; every position is re-derived from the live
//! tree after each host call.

mod engine;

pub use engine::{SyncEngine, TreeChange};
