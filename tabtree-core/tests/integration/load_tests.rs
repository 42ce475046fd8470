//! Tests for window load, snapshot restore and full resync

use std::sync::Arc;

use tabtree_core::tree::index;
use tabtree_core::{
    InMemoryHost, SNAPSHOT_KEY, SessionSnapshot, SidebarSettings, SyncEngine, TabId, TreeChange,
};

use super::{W, engine_over, ids, runtime};

const STORED: &str = r#"[
    {"containerIndex":0,"collapsed":false,"url":"a"},
    {"containerIndex":1,"collapsed":true,"url":"b"},
    {"containerIndex":1,"collapsed":true,"url":"c"},
    {"containerIndex":2,"collapsed":false,"url":"d"}
]"#;

async fn load_with_snapshot(host: &Arc<InMemoryHost>, urls: &[&str], stored: &str) -> SyncEngine {
    host.preload_value(SNAPSHOT_KEY, stored, W).await;
    engine_over(host, &urls.iter().map(|u| (*u, false)).collect::<Vec<_>>()).await
}

#[test]
fn test_load_restores_stored_layout() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let engine = load_with_snapshot(&host, &["a", "b", "c", "d"], STORED).await;

        assert_eq!(engine.tree().describe(), "[P] [1] {2 3}* [4]");
        assert!(engine.tree().entries().all(|e| e.state().is_stable()));
    });
}

#[test]
fn test_load_stops_restoring_at_url_mismatch() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let engine = load_with_snapshot(&host, &["a", "x", "c", "d"], STORED).await;

        assert_eq!(engine.tree().describe(), "[P] [1] [2] [3] [4]");
    });
}

#[test]
fn test_load_ignores_malformed_snapshot() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let engine = load_with_snapshot(&host, &["a", "b"], "{not json").await;

        assert_eq!(engine.tree().describe(), "[P] [1] [2]");
        let stored = host
            .stored_value(SNAPSHOT_KEY, W)
            .await
            .expect("load rewrites the snapshot");
        assert_eq!(SessionSnapshot::from_json(&stored).expect("valid JSON").len(), 2);
    });
}

#[test]
fn test_load_keeps_pinned_tabs_out_of_snapshot() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let engine = engine_over(&host, &[("p", true), ("a", false), ("b", false)]).await;

        assert_eq!(engine.tree().describe(), "[P 1] [2] [3]");
        let stored = host.stored_value(SNAPSHOT_KEY, W).await.expect("written on load");
        let snapshot = SessionSnapshot::from_json(&stored).expect("valid JSON");
        let urls: Vec<&str> = snapshot.records().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
    });
}

#[test]
fn test_empty_window_stores_nothing() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let engine = engine_over(&host, &[]).await;

        assert!(engine.tree().is_empty());
        assert_eq!(host.session_writes().await, 0);
    });
}

#[test]
fn test_snapshots_disabled_by_settings() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        host.seed_tab("a", false).await;
        let settings = SidebarSettings::default().with_persist_snapshots(false);
        let mut engine = SyncEngine::load(host.clone(), settings)
            .await
            .expect("window loads");
        host.open_tab("b").await;
        host.deliver(&mut engine).await.expect("events fold");

        assert_eq!(engine.tree().len(), 2);
        assert_eq!(host.session_writes().await, 0);
    });
}

#[test]
fn test_resync_keeps_contiguous_groups() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false), ("d", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2]))
            .await
            .expect("valid selection");
        let group = index::container_of(engine.tree(), TabId(1))
            .map(|c| c.id())
            .expect("grouped tab");
        engine.collapse(group).await.expect("group");

        host.move_tab(TabId(4), 0).await.expect("known tab");
        let _ = host.take_events().await;
        let mut changes = engine.subscribe();
        engine.resync().await.expect("host readable");

        assert_eq!(engine.tree().describe(), "[P] [4] {1 2}* [3]");
        assert_eq!(engine.tree().tab_ids(), host.tab_ids(W).await);
        assert_eq!(changes.try_recv().ok(), Some(TreeChange::Structure));
    });
}

#[test]
fn test_resync_splits_groups_broken_by_host() {
    let rt = runtime();
    rt.block_on(async {
        let host = Arc::new(InMemoryHost::new(W));
        let mut engine = engine_over(&host, &[("a", false), ("b", false), ("c", false)]).await;
        engine
            .group_selected_tabs(&ids(&[1, 2]))
            .await
            .expect("valid selection");

        host.move_tab(TabId(3), 1).await.expect("known tab");
        let _ = host.take_events().await;
        engine.resync().await.expect("host readable");

        assert_eq!(engine.tree().describe(), "[P] [1] [3] [2]");
    });
}
