//! Property tests for user operations issued while earlier batches are
//! still in flight.
//!
//! Grouping, detaching, dropping and ungrouping are interleaved with tabs
//! being moved, opened and closed on the host. Events are held back across
//! operations and delivered shuffled: the host's own events keep their
//! order, confirmations of requested moves may arrive anywhere, and the
//! events of one tab stay in sequence. Once everything has been delivered
//! the tree must match the host.

use std::sync::Arc;

use proptest::prelude::*;
use tabtree_core::{DropTarget, HostEvent, InMemoryHost, NewTab, SidebarSettings, SyncEngine, TabId};

use super::{W, runtime};

/// One step of a run. Tabs are picked modulo the live tab count.
#[derive(Debug, Clone)]
enum Step {
    Group(Vec<usize>),
    Detach(Vec<usize>),
    DropOnto {
        tabs: Vec<usize>,
        target: usize,
        kind: u8,
    },
    Ungroup(usize),
    HostMove {
        tab: usize,
        index: usize,
    },
    Open(Option<usize>),
    Close(usize),
    Deliver(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => proptest::collection::vec(0usize..16, 2..4).prop_map(Step::Group),
        2 => proptest::collection::vec(0usize..16, 1..4).prop_map(Step::Detach),
        3 => (proptest::collection::vec(0usize..16, 1..3), 0usize..16, 0u8..3)
            .prop_map(|(tabs, target, kind)| Step::DropOnto { tabs, target, kind }),
        1 => (0usize..4).prop_map(Step::Ungroup),
        2 => (0usize..16, 0usize..16).prop_map(|(tab, index)| Step::HostMove { tab, index }),
        1 => proptest::option::of(0usize..16).prop_map(Step::Open),
        1 => (0usize..16).prop_map(Step::Close),
        2 => (1usize..6).prop_map(Step::Deliver),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Changes made on the host side
    Host,
    /// Confirmations of moves the engine requested
    Requested,
}

#[derive(Debug)]
struct Held {
    source: Source,
    key: u32,
    event: HostEvent,
}

/// Event queue whose delivery order is driven by generated keys.
struct Backlog {
    held: Vec<Held>,
    keys: Vec<u32>,
    next_key: usize,
}

impl Backlog {
    fn new(keys: Vec<u32>) -> Self {
        Self {
            held: Vec::new(),
            keys,
            next_key: 0,
        }
    }

    async fn collect(&mut self, host: &InMemoryHost, source: Source) {
        for event in host.take_events().await {
            let key = self.keys[self.next_key % self.keys.len()];
            self.next_key += 1;
            self.held.push(Held { source, key, event });
        }
    }

    /// Whether `earlier` must be delivered before `later`.
    fn blocks(earlier: &Held, later: &Held) -> bool {
        let same_tab = earlier.event.tab_id().is_some() && earlier.event.tab_id() == later.event.tab_id();
        same_tab || (earlier.source == Source::Host && later.source == Source::Host)
    }

    fn next(&mut self) -> Option<HostEvent> {
        let pick = (0..self.held.len())
            .filter(|&i| self.held[..i].iter().all(|e| !Self::blocks(e, &self.held[i])))
            .min_by_key(|&i| self.held[i].key)?;
        Some(self.held.remove(pick).event)
    }

    async fn deliver(&mut self, engine: &mut SyncEngine, count: usize) {
        for _ in 0..count {
            let Some(event) = self.next() else {
                return;
            };
            engine.handle_event(event).await.expect("event folds");
        }
    }
}

/// Seeds pinned and unpinned tabs, then groups the first two and the last
/// two unpinned tabs locally.
async fn seeded(pinned: usize, unpinned: usize) -> (Arc<InMemoryHost>, SyncEngine) {
    let host = Arc::new(InMemoryHost::new(W));
    for i in 0..pinned {
        host.seed_tab(format!("https://p{i}.test"), true).await;
    }
    let mut free = Vec::with_capacity(unpinned);
    for i in 0..unpinned {
        free.push(host.seed_tab(format!("https://{i}.test"), false).await);
    }
    let mut engine = SyncEngine::load(host.clone(), SidebarSettings::default())
        .await
        .expect("window loads");
    for selection in [&free[..2], &free[unpinned - 2..]] {
        engine
            .group_selected_tabs(selection)
            .await
            .expect("adjacent tabs group locally");
    }
    (host, engine)
}

/// Tabs both the tree and the host still have, in tree order.
async fn live_tabs(host: &InMemoryHost, engine: &SyncEngine) -> Vec<TabId> {
    let on_host = host.tab_ids(W).await;
    engine
        .tree()
        .tab_ids()
        .into_iter()
        .filter(|id| on_host.contains(id))
        .collect()
}

fn choose(live: &[TabId], picks: &[usize]) -> Vec<TabId> {
    if live.is_empty() {
        return Vec::new();
    }
    picks.iter().map(|n| live[n % live.len()]).collect()
}

async fn run_step(host: &InMemoryHost, engine: &mut SyncEngine, backlog: &mut Backlog, step: &Step) {
    let live = live_tabs(host, engine).await;
    let host_ids = host.tab_ids(W).await;
    match step {
        Step::Group(picks) => {
            let _ = engine.group_selected_tabs(&choose(&live, picks)).await;
            backlog.collect(host, Source::Requested).await;
        }
        Step::Detach(picks) => {
            let _ = engine.detach_tabs_from_group(&choose(&live, picks)).await;
            backlog.collect(host, Source::Requested).await;
        }
        Step::DropOnto { tabs, target, kind } => {
            let Some(&anchor) = choose(&live, &[*target]).first() else {
                return;
            };
            let drop = match *kind {
                0 => DropTarget::Before(anchor),
                1 => DropTarget::After(anchor),
                _ => DropTarget::Into(anchor),
            };
            let _ = engine.move_tabs_to(&choose(&live, tabs), drop).await;
            backlog.collect(host, Source::Requested).await;
        }
        Step::Ungroup(n) => {
            let groups: Vec<_> = engine
                .tree()
                .unpinned()
                .iter()
                .filter(|c| c.is_group())
                .map(|c| c.id())
                .collect();
            if !groups.is_empty() {
                let _ = engine.ungroup_tabs(groups[n % groups.len()]).await;
            }
        }
        Step::HostMove { tab, index } => {
            if !host_ids.is_empty() {
                let id = host_ids[tab % host_ids.len()];
                host.move_tab(id, index % (host_ids.len() + 1))
                    .await
                    .expect("known tab");
            }
            backlog.collect(host, Source::Host).await;
        }
        Step::Open(index) => {
            let spec = NewTab::new("https://new.test");
            let spec = match index {
                Some(i) => spec.at(i % (host_ids.len() + 1)),
                None => spec,
            };
            host.open_tab_with(spec).await.expect("current window");
            backlog.collect(host, Source::Host).await;
        }
        Step::Close(n) => {
            if host_ids.len() > 1 {
                host.close_tab(host_ids[n % host_ids.len()])
                    .await
                    .expect("known tab");
            }
            backlog.collect(host, Source::Host).await;
        }
        Step::Deliver(count) => backlog.deliver(engine, *count).await,
    }
}

#[derive(Debug)]
struct Outcome {
    tree_order: Vec<TabId>,
    host_order: Vec<TabId>,
    pinned: (usize, usize),
    violations: Vec<String>,
    idle: bool,
    enroute: Vec<TabId>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Operations issued on top of unconfirmed batches, mixed with host-side
    /// changes and delivered out of order, still converge to the host order.
    #[test]
    fn prop_interleaved_operations_converge_to_host_order(
        pinned in 0usize..3,
        unpinned in 4usize..8,
        steps in proptest::collection::vec(step_strategy(), 1..14),
        keys in proptest::collection::vec(any::<u32>(), 16),
    ) {
        let rt = runtime();
        let outcome = rt.block_on(async {
            let (host, mut engine) = seeded(pinned, unpinned).await;
            let mut backlog = Backlog::new(keys);
            for step in &steps {
                run_step(&host, &mut engine, &mut backlog, step).await;
            }
            loop {
                backlog.collect(&host, Source::Host).await;
                if backlog.held.is_empty() {
                    break;
                }
                let remaining = backlog.held.len();
                backlog.deliver(&mut engine, remaining).await;
            }
            let host_tabs = host.tabs(W).await;
            Outcome {
                tree_order: engine.tree().tab_ids(),
                host_order: host_tabs.iter().map(|t| t.id).collect(),
                pinned: (
                    engine.tree().pinned_count(),
                    host_tabs.iter().filter(|t| t.pinned).count(),
                ),
                violations: engine.tree().invariant_violations(),
                idle: engine.correlator().is_idle(),
                enroute: engine.tree().enroute_tabs(),
            }
        });

        prop_assert!(outcome.idle);
        prop_assert_eq!(&outcome.tree_order, &outcome.host_order);
        prop_assert_eq!(outcome.pinned.0, outcome.pinned.1);
        prop_assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
        prop_assert!(outcome.enroute.is_empty());
    }
}
