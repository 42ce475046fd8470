//! Property test modules

mod batch_convergence_tests;
mod concurrent_ops_tests;
mod snapshot_roundtrip_tests;
mod tree_invariant_tests;

use std::sync::Arc;

use tabtree_core::{InMemoryHost, SidebarSettings, SyncEngine, WindowId};

/// Window every property test runs in
pub const W: WindowId = WindowId(1);

/// Creates a runtime for driving async engine code from `proptest!` bodies
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("Failed to create runtime")
}

/// Seeds `count` unpinned tabs and loads an engine over them
pub async fn engine_with(count: usize) -> (Arc<InMemoryHost>, SyncEngine) {
    let host = Arc::new(InMemoryHost::new(W));
    for i in 0..count {
        host.seed_tab(format!("https://{i}.test"), false).await;
    }
    let engine = SyncEngine::load(host.clone(), SidebarSettings::default())
        .await
        .expect("window loads");
    (host, engine)
}
