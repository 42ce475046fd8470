//! Scenario tests for grouping, detaching and host-side tab activity

use std::sync::Arc;

use tabtree_core::tree::index;
use tabtree_core::{DropTarget, InMemoryHost, NewTab, TabId, TreeChange, WindowId};

use super::{W, engine_over, ids, runtime, settle};

#[test]
fn test_detach_middle_child_lands_after_group() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2, 3]))
            .await
            .expect("valid selection");
        assert_eq!(engine.tree().describe(), "[P] {1 2 3}");

        let batches = engine
            .detach_tabs_from_group(&ids(&[2]))
            .await
            .expect("valid selection");
        assert_eq!(batches.len(), 1);
        assert_eq!(engine.tree().describe(), "[P] {1 2~ 3}");

        settle(&host, &mut engine).await;
        assert_eq!(engine.tree().describe(), "[P] {1 3} [2]");
        assert_eq!(host.tab_ids(W).await, ids(&[1, 3, 2]));
    });
}

#[test]
fn test_detach_across_groups_with_reversed_confirmations() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let tabs = [("a", false), ("b", false), ("c", false), ("d", false), ("e", false)];
        let mut engine = engine_over(&host, &tabs).await;
        for selection in [[1, 2], [3, 4]] {
            engine
                .group_selected_tabs(&ids(&selection))
                .await
                .expect("valid selection");
        }

        engine
            .detach_tabs_from_group(&ids(&[1, 3]))
            .await
            .expect("valid selection");
        let mut events = host.take_events().await;
        events.reverse();
        for event in events {
            engine.handle_event(event).await.expect("event folds");
        }

        assert_eq!(host.tab_ids(W).await, ids(&[2, 1, 4, 3, 5]));
        assert_eq!(engine.tree().tab_ids(), host.tab_ids(W).await);
        assert_eq!(engine.tree().describe(), "[P] [2] [1] [4] [3] [5]");
        assert!(engine.correlator().is_idle());
    });
}

#[test]
fn test_drop_issued_before_group_confirms_uses_host_slot() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let tabs = [("p", true), ("a", false), ("b", false), ("c", false), ("d", false), ("e", false)];
        let mut engine = engine_over(&host, &tabs).await;

        engine
            .group_selected_tabs(&ids(&[5, 2]))
            .await
            .expect("valid selection");
        engine
            .move_tabs_to(&ids(&[6]), DropTarget::Before(TabId(3)))
            .await
            .expect("valid drop");
        assert_eq!(host.tab_ids(W).await, ids(&[1, 6, 3, 4, 5, 2]));

        settle(&host, &mut engine).await;
        assert_eq!(engine.tree().describe(), "[P 1] [6] [3] [4] {5 2}");
    });
}

#[test]
fn test_pinned_created_at_index_two_joins_pinned_segment() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("p1", true), ("p2", true), ("u", false)]).await;
        assert_eq!(engine.tree().describe(), "[P 1 2] [3]");

        host.open_tab_with(NewTab::new("p3").at(2).pinned())
            .await
            .expect("current window");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P 1 2 4] [3]");
        assert_eq!(engine.tree().pinned().len(), 3);
        assert!(engine.tree().pinned().is_visually_grouped());
    });
}

#[test]
fn test_incognito_window_never_writes_snapshot() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::with_incognito(W, true));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        assert!(engine.is_incognito());

        engine
            .group_selected_tabs(&ids(&[1, 3]))
            .await
            .expect("valid selection");
        settle(&host, &mut engine).await;
        host.open_tab("d").await;
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] {1 3} [2] [4]");
        assert_eq!(host.session_writes().await, 0);
        assert_eq!(host.stored_value(&engine.settings().snapshot_key, W).await, None);
    });
}

#[test]
fn test_group_ungroup_and_collapse_cycle() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false), ("d", false)]).await;

        engine
            .group_selected_tabs(&ids(&[4, 2]))
            .await
            .expect("valid selection");
        settle(&host, &mut engine).await;
        assert_eq!(engine.tree().describe(), "[P] [1] [3] {4 2}");

        let group = index::container_of(engine.tree(), TabId(4))
            .map(|c| c.id())
            .expect("grouped tab");
        assert!(engine.toggle_collapse(group).await.expect("group"));
        assert_eq!(engine.tree().describe(), "[P] [1] [3] {4 2}*");
        assert!(!engine.toggle_collapse(group).await.expect("group"));

        let singles = engine.ungroup_tabs(group).await.expect("group");
        assert_eq!(singles.len(), 2);
        assert_eq!(engine.tree().describe(), "[P] [1] [3] [4] [2]");
        assert_eq!(engine.tree().tab_ids(), host.tab_ids(W).await);
    });
}

#[test]
fn test_drop_into_group_then_pin() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false), ("d", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2]))
            .await
            .expect("valid selection");
        assert_eq!(engine.tree().describe(), "[P] {1 2} [3] [4]");

        engine
            .move_tabs_to(&ids(&[4]), DropTarget::Into(TabId(1)))
            .await
            .expect("valid drop");
        settle(&host, &mut engine).await;
        assert_eq!(engine.tree().describe(), "[P] {1 2 4} [3]");

        let changed = engine.set_pinned(&ids(&[3]), true).await.expect("valid selection");
        assert_eq!(changed, 1);
        settle(&host, &mut engine).await;
        assert_eq!(engine.tree().describe(), "[P 3] {1 2 4}");
    });
}

#[test]
fn test_tab_opened_from_group_joins_it() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2]))
            .await
            .expect("valid selection");

        host.open_tab_with(NewTab::new("child").opened_by(TabId(1)))
            .await
            .expect("current window");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] {1 2 4} [3]");
    });
}

#[test]
fn test_closing_group_member_prunes_group() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2]))
            .await
            .expect("valid selection");

        host.close_tab(TabId(2)).await.expect("known tab");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] [1] [3]");
        assert!(engine.tree().invariant_violations().is_empty());
    });
}

#[test]
fn test_activating_hidden_child_expands_group() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2, 3]))
            .await
            .expect("valid selection");
        let group = index::container_of(engine.tree(), TabId(1))
            .map(|c| c.id())
            .expect("grouped tab");
        engine.collapse(group).await.expect("group");
        assert_eq!(engine.tree().describe(), "[P] {1 2 3}*");

        let mut changes = engine.subscribe();
        host.activate(TabId(3)).await.expect("known tab");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().active(), Some(TabId(3)));
        assert_eq!(engine.tree().describe(), "[P] {1 2 3}");
        assert_eq!(changes.try_recv().ok(), Some(TreeChange::Active(Some(TabId(3)))));
        assert_eq!(changes.try_recv().ok(), Some(TreeChange::Structure));
    });
}

#[test]
fn test_tab_transferred_between_windows() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        host.add_window(WindowId(2), false).await;
        let mut engine = engine_over(&host, &[("a", false), ("b", false)]).await;

        host.transfer_tab(TabId(1), WindowId(2))
            .await
            .expect("known tab and window");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] [2]");
        assert!(engine.lookup(TabId(1)).is_none());
    });
}
