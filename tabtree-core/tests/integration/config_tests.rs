//! Tests for settings files and the behaviour they switch

use std::sync::Arc;

use tabtree_core::{
    ConfigManager, InMemoryHost, NewTab, SidebarSettings, SyncEngine, TabId, TracingLevel,
};
use tempfile::TempDir;

use super::{W, ids, runtime, settle};

async fn grouped_window(settings: SidebarSettings) -> (Arc<InMemoryHost>, SyncEngine) {
    let host = Arc::new(InMemoryHost::new(W));
    for url in ["a", "b", "c"] {
        host.seed_tab(url, false).await;
    }
    let mut engine = SyncEngine::load(host.clone(), settings)
        .await
        .expect("window loads");
    engine
        .group_selected_tabs(&ids(&[1, 2]))
        .await
        .expect("valid selection");
    (host, engine)
}

#[test]
fn test_settings_file_is_read() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        dir.path().join("sidebar.toml"),
        "group_new_tabs_at_end = true\n\n[logging]\nlevel = \"debug\"\n",
    )
    .expect("writable");

    let settings = ConfigManager::with_config_dir(dir.path())
        .load_settings()
        .expect("valid settings");

    assert!(settings.group_new_tabs_at_end);
    assert!(settings.expand_on_activate);
    assert_eq!(settings.logging.level, TracingLevel::Debug);
    assert_eq!(settings.logging.to_tracing_config().level, TracingLevel::Debug);
}

#[test]
fn test_new_tab_takes_host_slot_by_default() {
    let rt = runtime();
    rt.block_on(async {
        let (host, mut engine) = grouped_window(SidebarSettings::default()).await;

        host.open_tab_with(NewTab::new("d").at(1).opened_by(TabId(1)))
            .await
            .expect("current window");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] {1 4 2} [3]");
    });
}

#[test]
fn test_new_tab_goes_to_group_end_when_configured() {
    let rt = runtime();
    rt.block_on(async {
        let settings = SidebarSettings::default().with_group_new_tabs_at_end(true);
        let (host, mut engine) = grouped_window(settings).await;

        host.open_tab_with(NewTab::new("d").at(1).opened_by(TabId(1)))
            .await
            .expect("current window");
        settle(&host, &mut engine).await;

        assert_eq!(engine.tree().describe(), "[P] {1 2 4} [3]");
        assert_eq!(host.tab_ids(W).await, ids(&[1, 2, 4, 3]));
    });
}

#[test]
fn test_saved_settings_round_trip_through_directory() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ConfigManager::with_config_dir(dir.path().join("tabtree"));
    let settings = SidebarSettings::default()
        .with_expand_on_activate(false)
        .with_persist_snapshots(false);

    manager.save_settings(&settings).expect("writable");
    let reloaded = ConfigManager::with_config_dir(manager.config_dir())
        .load_settings()
        .expect("readable");

    assert_eq!(reloaded, settings);
}
