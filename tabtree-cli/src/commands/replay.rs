//! Script replay command.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tabtree_core::tree::index;
use tabtree_core::{
    ContainerId, DropTarget, GroupOpError, HostError, InMemoryHost, NewTab, SidebarSettings,
    SyncEngine, TabId, WindowId,
};
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::script::{DropPosition, Script, Step};

/// Window every script runs in
const WINDOW: WindowId = WindowId(1);

/// One container of the final tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerView {
    /// `pinned`, `singleton` or `group`
    pub kind: &'static str,
    /// Collapsed flag
    pub collapsed: bool,
    /// Tabs in order
    pub tabs: Vec<TabId>,
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Compact tree dump
    pub tree: String,
    /// Containers in order
    pub containers: Vec<ContainerView>,
    /// Host tab order
    pub host_order: Vec<TabId>,
    /// Active tab
    pub active: Option<TabId>,
    /// Last stored snapshot value
    pub snapshot: Option<String>,
    /// Steps the host rejected
    pub failures: Vec<String>,
}

/// Why a step did not apply.
enum StepError {
    /// The host rejected the step; replay continues
    Rejected(String),
    /// The step is invalid for the current tree; replay stops
    Invalid(String),
}

impl From<GroupOpError> for StepError {
    fn from(err: GroupOpError) -> Self {
        match err {
            GroupOpError::Host { .. } => Self::Rejected(err.to_string()),
            other => Self::Invalid(other.to_string()),
        }
    }
}

impl From<HostError> for StepError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::TabNotFound(_) | HostError::WindowNotFound(_) => {
                Self::Invalid(err.to_string())
            }
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// Replay command handler
pub fn cmd_replay(
    settings: SidebarSettings,
    script_path: &Path,
    format: OutputFormat,
) -> Result<(), CliError> {
    let script = Script::from_file(script_path)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to create async runtime: {e}")))?;
    let report = runtime.block_on(replay(&script, settings))?;

    match format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

/// Runs a script against a fresh in-memory host.
///
/// Host events are delivered after every step, so batches settle before
/// the next step runs.
///
/// # Errors
///
/// Returns `CliError::Step` for a step that references an unknown tab or
/// container and `CliError::Sync` when event folding fails.
pub async fn replay(script: &Script, settings: SidebarSettings) -> Result<ReplayReport, CliError> {
    let host = Arc::new(InMemoryHost::with_incognito(WINDOW, script.incognito));
    for tab in &script.tabs {
        host.seed_tab(tab.url.clone(), tab.pinned).await;
    }
    let key = settings.snapshot_key.clone();
    if let Some(value) = &script.snapshot {
        host.preload_value(&key, value.clone(), WINDOW).await;
    }

    let mut engine = SyncEngine::load(host.clone(), settings).await?;
    let mut failures = Vec::new();
    for (number, step) in script.steps.iter().enumerate() {
        info!(step = number, action = step.name(), "Replaying step");
        match apply_step(&host, &mut engine, step).await {
            Ok(()) => {}
            Err(StepError::Rejected(reason)) => {
                warn!(step = number, %reason, "Step rejected");
                failures.push(format!("step {number} ({}): {reason}", step.name()));
            }
            Err(StepError::Invalid(reason)) => {
                return Err(CliError::Step {
                    step: number,
                    reason,
                });
            }
        }
        host.deliver(&mut engine).await?;
    }

    let containers = engine
        .tree()
        .containers()
        .iter()
        .map(|c| ContainerView {
            kind: c.kind().label(),
            collapsed: c.is_collapsed(),
            tabs: c.tab_ids(),
        })
        .collect();
    Ok(ReplayReport {
        tree: engine.tree().describe(),
        containers,
        host_order: host.tab_ids(WINDOW).await,
        active: engine.tree().active(),
        snapshot: host.stored_value(&key, WINDOW).await,
        failures,
    })
}

async fn apply_step(host: &InMemoryHost, engine: &mut SyncEngine, step: &Step) -> Result<(), StepError> {
    match step {
        Step::Open {
            url,
            index,
            opener,
            pinned,
            active,
        } => {
            let mut spec = NewTab::new(url.clone());
            if let Some(index) = index {
                spec = spec.at(*index);
            }
            if let Some(opener) = opener {
                spec = spec.opened_by(*opener);
            }
            if *pinned {
                spec = spec.pinned();
            }
            if *active {
                spec = spec.active();
            }
            host.open_tab_with(spec).await?;
        }
        Step::Close { tab } => host.close_tab(*tab).await?,
        Step::Move { tab, index } => host.move_tab(*tab, *index).await?,
        Step::Pin { tab, pinned } => host.pin_tab(*tab, *pinned).await?,
        Step::Navigate { tab, url } => host.navigate(*tab, url.clone()).await?,
        Step::Activate { tab } => host.activate(*tab).await?,
        Step::Highlight { tabs } => host.highlight(tabs).await?,
        Step::FailMoves { count } => host.fail_next_moves(*count).await,
        Step::Group { tabs } => {
            engine.group_selected_tabs(tabs).await?;
        }
        Step::Detach { tabs } => {
            engine.detach_tabs_from_group(tabs).await?;
        }
        Step::Ungroup { tab } => {
            let container = container_of(engine, *tab)?;
            engine.ungroup_tabs(container).await?;
        }
        Step::Collapse { tab } => {
            let container = container_of(engine, *tab)?;
            engine.collapse(container).await?;
        }
        Step::Expand { tab } => {
            let container = container_of(engine, *tab)?;
            engine.expand(container).await?;
        }
        Step::Drop {
            tabs,
            position,
            target,
        } => {
            let target = match position {
                DropPosition::Before => DropTarget::Before(*target),
                DropPosition::After => DropTarget::After(*target),
                DropPosition::Into => DropTarget::Into(*target),
            };
            engine.move_tabs_to(tabs, target).await?;
        }
        Step::SetPinned { tabs, pinned } => {
            engine.set_pinned(tabs, *pinned).await?;
        }
        Step::Resync => engine
            .resync()
            .await
            .map_err(|e| StepError::Rejected(e.to_string()))?,
    }
    Ok(())
}

fn container_of(engine: &SyncEngine, tab: TabId) -> Result<ContainerId, StepError> {
    index::container_of(engine.tree(), tab)
        .map(|c| c.id())
        .ok_or_else(|| StepError::Invalid(format!("unknown tab {tab}")))
}

fn print_text(report: &ReplayReport) {
    println!("{}", report.tree);
    let order: Vec<String> = report.host_order.iter().map(|id| id.get().to_string()).collect();
    println!("host order: {}", order.join(" "));
    if let Some(active) = report.active {
        println!("active: {}", active.get());
    }
    for failure in &report.failures {
        println!("rejected: {failure}");
    }
}

fn print_json(report: &ReplayReport) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::Script(format!("Failed to serialize report: {e}")))?;
    println!("{json}");
    Ok(())
}
