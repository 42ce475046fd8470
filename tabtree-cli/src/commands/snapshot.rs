//! Snapshot inspection command.

use std::path::Path;

use tabtree_core::{SessionSnapshot, SnapshotRecord};

use crate::error::CliError;

/// Snapshot command handler
pub fn cmd_snapshot(file: &Path) -> Result<(), CliError> {
    let content = std::fs::read_to_string(file)?;
    let snapshot = SessionSnapshot::from_json(content.trim())
        .map_err(|e| CliError::Snapshot(format!("Failed to decode {}: {e}", file.display())))?;

    println!(
        "{} positions in {} containers",
        snapshot.len(),
        snapshot.container_count()
    );
    for line in render(snapshot.records()) {
        println!("{line}");
    }
    Ok(())
}

/// One line per container: index, collapsed marker and URLs.
fn render(records: &[SnapshotRecord]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<usize> = None;
    for record in records {
        if current != Some(record.container_index) {
            current = Some(record.container_index);
            let marker = if record.collapsed { " (collapsed)" } else { "" };
            lines.push(format!("#{}{marker}:", record.container_index));
        }
        if let Some(line) = lines.last_mut() {
            line.push(' ');
            line.push_str(if record.url.is_empty() { "-" } else { &record.url });
        }
    }
    lines
}
