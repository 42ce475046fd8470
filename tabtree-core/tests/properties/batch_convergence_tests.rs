//! Property tests for batch convergence of grouping operations.
//!
//! The host reports one moved-event per tab of a batch; whatever order
//! they are folded in, the selection must end up as one contiguous group
//! in selection order.

use proptest::prelude::*;
use tabtree_core::{HostEvent, TabId};

use super::{W, engine_with, runtime};

/// Tab count plus a selection of at least two distinct tabs in any order
fn selection_strategy() -> impl Strategy<Value = (usize, Vec<i64>)> {
    (3usize..9).prop_flat_map(|count| {
        let ids: Vec<i64> = (1..=count as i64).collect();
        (
            Just(count),
            proptest::sample::subsequence(ids, 2..=count).prop_shuffle(),
        )
    })
}

/// Reorders events by the generated keys; ties keep their relative order.
fn permute(events: Vec<HostEvent>, keys: &[u32]) -> Vec<HostEvent> {
    let mut keyed: Vec<(u32, usize, HostEvent)> = events
        .into_iter()
        .enumerate()
        .map(|(i, event)| (keys[i % keys.len()], i, event))
        .collect();
    keyed.sort_by_key(|(key, i, _)| (*key, *i));
    keyed.into_iter().map(|(_, _, event)| event).collect()
}

#[derive(Debug)]
struct Outcome {
    tree_order: Vec<TabId>,
    host_order: Vec<TabId>,
    anchor_group: Vec<TabId>,
    anchor_is_group: bool,
    violations: Vec<String>,
    idle: bool,
    enroute: Vec<TabId>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Grouping N tabs converges to one contiguous group, in selection
    /// order, for any confirmation order.
    #[test]
    fn prop_group_converges_in_any_confirmation_order(
        (count, raw) in selection_strategy(),
        keys in proptest::collection::vec(any::<u32>(), 8),
    ) {
        let selection: Vec<TabId> = raw.iter().map(|&i| TabId(i)).collect();
        let rt = runtime();
        let outcome = rt.block_on(async {
            let (host, mut engine) = engine_with(count).await;
            engine
                .group_selected_tabs(&selection)
                .await
                .expect("valid selection");
            for event in permute(host.take_events().await, &keys) {
                engine.handle_event(event).await.expect("event folds");
            }
            let anchor = engine
                .tree()
                .containers()
                .iter()
                .find(|c| c.contains(selection[0]))
                .expect("anchor present");
            Outcome {
                tree_order: engine.tree().tab_ids(),
                host_order: host.tab_ids(W).await,
                anchor_group: anchor.tab_ids(),
                anchor_is_group: anchor.is_group(),
                violations: engine.tree().invariant_violations(),
                idle: engine.correlator().is_idle(),
                enroute: engine.tree().enroute_tabs(),
            }
        });

        prop_assert_eq!(&outcome.anchor_group, &selection);
        prop_assert!(outcome.anchor_is_group);
        prop_assert_eq!(&outcome.tree_order, &outcome.host_order);
        prop_assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
        prop_assert!(outcome.idle);
        prop_assert!(outcome.enroute.is_empty());
    }

    /// A batch that lands in any order still writes exactly one snapshot
    /// once it has settled.
    #[test]
    fn prop_snapshot_written_once_per_settled_batch(
        (count, raw) in selection_strategy(),
        keys in proptest::collection::vec(any::<u32>(), 8),
    ) {
        let selection: Vec<TabId> = raw.iter().map(|&i| TabId(i)).collect();
        let rt = runtime();
        let (writes_before, writes_after, batched) = rt.block_on(async {
            let (host, mut engine) = engine_with(count).await;
            let writes_before = host.session_writes().await;
            let batch = engine
                .group_selected_tabs(&selection)
                .await
                .expect("valid selection");
            for event in permute(host.take_events().await, &keys) {
                engine.handle_event(event).await.expect("event folds");
            }
            (writes_before, host.session_writes().await, batch.is_some())
        });

        prop_assert_eq!(writes_after, writes_before + 1, "batched: {}", batched);
    }
}
