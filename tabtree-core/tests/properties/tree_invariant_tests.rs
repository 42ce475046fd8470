//! Property tests for the order and partition invariants of the visual tree
//! and the idempotence of folded moves.

use proptest::prelude::*;
use tabtree_core::{HostEvent, InMemoryHost, NewTab, SyncEngine, TabId};

use super::{W, engine_with, runtime};

/// One host-side action. Tab positions are taken modulo the live tab count.
#[derive(Debug, Clone)]
enum HostOp {
    Open {
        index: Option<usize>,
        opener: Option<usize>,
        pinned: bool,
        active: bool,
    },
    Close(usize),
    Move {
        tab: usize,
        index: usize,
    },
    Pin {
        tab: usize,
        pinned: bool,
    },
    Activate(usize),
}

fn host_op_strategy() -> impl Strategy<Value = HostOp> {
    prop_oneof![
        3 => (
            proptest::option::of(0usize..12),
            proptest::option::of(0usize..12),
            proptest::bool::weighted(0.2),
            any::<bool>(),
        )
            .prop_map(|(index, opener, pinned, active)| HostOp::Open {
                index,
                opener,
                pinned,
                active,
            }),
        1 => (0usize..12).prop_map(HostOp::Close),
        3 => (0usize..12, 0usize..12).prop_map(|(tab, index)| HostOp::Move { tab, index }),
        1 => (0usize..12, any::<bool>()).prop_map(|(tab, pinned)| HostOp::Pin { tab, pinned }),
        1 => (0usize..12).prop_map(HostOp::Activate),
    ]
}

async fn pick(host: &InMemoryHost, n: usize) -> Option<TabId> {
    let ids = host.tab_ids(W).await;
    (!ids.is_empty()).then(|| ids[n % ids.len()])
}

async fn apply(host: &InMemoryHost, op: &HostOp) {
    match op {
        HostOp::Open {
            index,
            opener,
            pinned,
            active,
        } => {
            let mut spec = NewTab::new(format!("https://new-{}.test", host.tab_ids(W).await.len()));
            if let Some(index) = index {
                spec = spec.at(*index);
            }
            if let Some(n) = opener {
                if let Some(opener) = pick(host, *n).await {
                    spec = spec.opened_by(opener);
                }
            }
            if *pinned {
                spec = spec.pinned();
            }
            if *active {
                spec = spec.active();
            }
            host.open_tab_with(spec).await.expect("current window exists");
        }
        HostOp::Close(n) => {
            if let Some(id) = pick(host, *n).await {
                host.close_tab(id).await.expect("live tab");
            }
        }
        HostOp::Move { tab, index } => {
            if let Some(id) = pick(host, *tab).await {
                host.move_tab(id, *index).await.expect("live tab");
            }
        }
        HostOp::Pin { tab, pinned } => {
            if let Some(id) = pick(host, *tab).await {
                host.pin_tab(id, *pinned).await.expect("live tab");
            }
        }
        HostOp::Activate(n) => {
            if let Some(id) = pick(host, *n).await {
                host.activate(id).await.expect("live tab");
            }
        }
    }
}

/// Structural summary checked after every step.
#[derive(Debug)]
struct Observed {
    tree_order: Vec<TabId>,
    host_order: Vec<TabId>,
    tree_pinned: Vec<TabId>,
    host_pinned: Vec<TabId>,
    violations: Vec<String>,
    idle: bool,
    all_stable: bool,
}

async fn observe(host: &InMemoryHost, engine: &SyncEngine) -> Observed {
    let tabs = host.tabs(W).await;
    Observed {
        tree_order: engine.tree().tab_ids(),
        host_order: tabs.iter().map(|t| t.id).collect(),
        tree_pinned: engine.tree().pinned().tab_ids(),
        host_pinned: tabs.iter().filter(|t| t.pinned).map(|t| t.id).collect(),
        violations: engine.tree().invariant_violations(),
        idle: engine.correlator().is_idle(),
        all_stable: engine.tree().entries().all(|e| e.state().is_stable()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// With no pending moves, the tree's flattened order equals the host's
    /// order and the pinned segment holds exactly the host's pinned prefix.
    #[test]
    fn prop_tree_order_matches_host(
        seeded in 0usize..6,
        ops in proptest::collection::vec(host_op_strategy(), 1..25),
    ) {
        let rt = runtime();
        let observations = rt.block_on(async {
            let (host, mut engine) = engine_with(seeded).await;
            let mut observations = Vec::with_capacity(ops.len());
            for op in &ops {
                apply(&host, op).await;
                host.deliver(&mut engine).await.expect("events fold");
                observations.push(observe(&host, &engine).await);
            }
            observations
        });

        for (step, seen) in observations.iter().enumerate() {
            prop_assert_eq!(&seen.tree_order, &seen.host_order, "order diverged at step {}", step);
            prop_assert_eq!(&seen.tree_pinned, &seen.host_pinned, "pinned prefix diverged at step {}", step);
            prop_assert!(seen.violations.is_empty(), "step {}: {:?}", step, seen.violations);
            prop_assert!(seen.idle, "pending batch after step {}", step);
            prop_assert!(seen.all_stable, "unsettled entry after step {}", step);
        }
    }

    /// Folding the same moved-event a second time leaves the tree shape
    /// unchanged.
    #[test]
    fn prop_repeated_move_is_noop(
        seeded in 2usize..8,
        moves in proptest::collection::vec((0usize..8, 0usize..8), 1..10),
    ) {
        let rt = runtime();
        let pairs = rt.block_on(async {
            let (host, mut engine) = engine_with(seeded).await;
            let mut pairs = Vec::new();
            for (tab, index) in &moves {
                let id = pick(&host, *tab).await.expect("seeded tabs");
                host.move_tab(id, *index).await.expect("live tab");
                for event in host.take_events().await {
                    let repeat = matches!(event, HostEvent::Moved { .. });
                    engine.handle_event(event.clone()).await.expect("event folds");
                    if repeat {
                        let once = engine.tree().describe();
                        engine.handle_event(event).await.expect("event folds");
                        pairs.push((once, engine.tree().describe()));
                    }
                }
            }
            pairs
        });

        for (once, twice) in pairs {
            prop_assert_eq!(once, twice);
        }
    }
}
