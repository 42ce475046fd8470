//! Integration test modules

mod config_tests;
mod load_tests;
mod scenario_tests;

use std::sync::Arc;

use tabtree_core::{InMemoryHost, SidebarSettings, SyncEngine, TabId, WindowId};

/// Window every scenario runs in
pub const W: WindowId = WindowId(1);

/// Creates a runtime for driving async engine code from plain tests
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("Failed to create runtime")
}

/// Seeds one tab per `(url, pinned)` and loads an engine over them
pub async fn engine_over(host: &Arc<InMemoryHost>, tabs: &[(&str, bool)]) -> SyncEngine {
    for (url, pinned) in tabs {
        host.seed_tab(*url, *pinned).await;
    }
    SyncEngine::load(host.clone(), SidebarSettings::default())
        .await
        .expect("window loads")
}

/// Delivers every queued event and checks the tree agrees with the host
pub async fn settle(host: &InMemoryHost, engine: &mut SyncEngine) {
    host.deliver(engine).await.expect("events fold");
    assert_eq!(engine.tree().tab_ids(), host.tab_ids(W).await);
    assert!(engine.correlator().is_idle(), "batch still pending");
}

/// Builds tab ids from raw numbers
pub fn ids(raw: &[i64]) -> Vec<TabId> {
    raw.iter().map(|&i| TabId(i)).collect()
}
