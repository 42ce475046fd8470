//! Property tests for session snapshot capture and restore.

use std::sync::Arc;

use proptest::prelude::*;
use tabtree_core::{
    InMemoryHost, SessionSnapshot, SidebarSettings, SnapshotRecord, SyncEngine, TabEntry, TabId,
};

use super::{W, runtime};

/// Container sizes with collapsed flags; singletons are never collapsed
fn layout_strategy() -> impl Strategy<Value = Vec<(usize, bool)>> {
    proptest::collection::vec((1usize..4, any::<bool>()), 1..7).prop_map(|layout| {
        layout
            .into_iter()
            .map(|(size, collapsed)| (size, collapsed && size > 1))
            .collect()
    })
}

fn records_for(layout: &[(usize, bool)]) -> Vec<SnapshotRecord> {
    let mut records = Vec::new();
    for (container_index, (size, collapsed)) in layout.iter().enumerate() {
        for _ in 0..*size {
            records.push(SnapshotRecord {
                container_index,
                collapsed: *collapsed,
                url: format!("https://{}.test", records.len()),
            });
        }
    }
    records
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Restoring a snapshot over entries with identical URLs reproduces
    /// the recorded container layout.
    #[test]
    fn prop_restore_reproduces_layout(layout in layout_strategy()) {
        let records = records_for(&layout);
        let snapshot = SessionSnapshot::from_records(records.clone());
        let live: Vec<TabEntry> = records
            .iter()
            .enumerate()
            .map(|(i, r)| TabEntry::new(TabId(i as i64 + 1), r.url.clone()))
            .collect();

        let restored = snapshot.restore(live);

        prop_assert_eq!(restored.matched, records.len());
        let shape: Vec<(usize, bool)> = restored
            .groups
            .iter()
            .map(|(tabs, collapsed)| (tabs.len(), *collapsed))
            .collect();
        prop_assert_eq!(shape, layout);
    }

    /// Loading a window over a stored snapshot and capturing it again
    /// yields the same snapshot.
    #[test]
    fn prop_load_then_capture_round_trips(layout in layout_strategy()) {
        let records = records_for(&layout);
        let original = SessionSnapshot::from_records(records.clone());
        let json = original.to_json().expect("serializable");

        let rt = runtime();
        let (captured, stored, containers) = rt.block_on(async {
            let host = Arc::new(InMemoryHost::new(W));
            for record in &records {
                host.seed_tab(record.url.clone(), false).await;
            }
            let settings = SidebarSettings::default();
            host.preload_value(&settings.snapshot_key, json, W).await;
            let key = settings.snapshot_key.clone();
            let engine = SyncEngine::load(host.clone(), settings)
                .await
                .expect("window loads");
            (
                SessionSnapshot::capture(engine.tree(), false),
                host.stored_value(&key, W).await,
                engine.tree().unpinned().len(),
            )
        });

        prop_assert_eq!(containers, layout.len());
        prop_assert_eq!(captured.as_ref(), Some(&original));
        let stored = stored.map(|value| SessionSnapshot::from_json(&value).expect("stored JSON parses"));
        prop_assert_eq!(stored.as_ref(), Some(&original));
    }
}
