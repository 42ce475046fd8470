//! Session snapshots of the tree shape
//!
//! Host tab ids do not survive a reload, so a snapshot records, per visual
//! position of the unpinned partition, the container index, the collapsed
//! flag and the URL. On restore the URL is the only correlation key: the
//! snapshot is followed while URLs match and abandoned at the first break.
//!
//! The stored value is a JSON array:
//!
//! ```json
//! [{"containerIndex":0,"collapsed":false,"url":"https://a.test"}]
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SnapshotError, SnapshotResult};
use crate::host::TabHost;
use crate::models::{TabEntry, WindowId};
use crate::tree::TabTree;

/// Default session storage key.
pub const SNAPSHOT_KEY: &str = "tabtree.containers";

/// One visual position of the unpinned partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Index of the container among the unpinned containers
    #[serde(rename = "containerIndex")]
    pub container_index: usize,
    /// Collapsed flag of that container
    #[serde(default)]
    pub collapsed: bool,
    /// URL of the tab at this position
    #[serde(default)]
    pub url: String,
}

/// Persisted shape of a window's unpinned containers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSnapshot {
    records: Vec<SnapshotRecord>,
}

/// Result of [`SessionSnapshot::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredLayout {
    /// Containers in order with their collapsed flag
    pub groups: Vec<(Vec<TabEntry>, bool)>,
    /// Number of leading entries placed from the snapshot
    pub matched: usize,
}

impl SessionSnapshot {
    /// Builds a snapshot from records.
    #[must_use]
    pub const fn from_records(records: Vec<SnapshotRecord>) -> Self {
        Self { records }
    }

    /// Records the tree's unpinned shape.
    ///
    /// Returns `None` for private windows and when there is nothing to record.
    #[must_use]
    pub fn capture(tree: &TabTree, incognito: bool) -> Option<Self> {
        if incognito {
            return None;
        }
        let records: Vec<SnapshotRecord> = tree
            .unpinned()
            .iter()
            .enumerate()
            .flat_map(|(container_index, container)| {
                let collapsed = container.is_collapsed();
                container.tabs().iter().map(move |entry| SnapshotRecord {
                    container_index,
                    collapsed,
                    url: entry.url.clone(),
                })
            })
            .collect();
        (!records.is_empty()).then_some(Self { records })
    }

    /// Records in visual order.
    #[must_use]
    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    /// Number of recorded positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct containers recorded.
    #[must_use]
    pub fn container_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for record in &self.records {
            if last != Some(record.container_index) {
                count += 1;
                last = Some(record.container_index);
            }
        }
        count
    }

    /// Serializes to the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Serialization` if encoding fails.
    pub fn to_json(&self) -> SnapshotResult<String> {
        serde_json::to_string(self).map_err(SnapshotError::Serialization)
    }

    /// Parses the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Deserialization` for malformed input.
    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        serde_json::from_str(json).map_err(SnapshotError::Deserialization)
    }

    /// Lays out freshly emulated unpinned entries following the snapshot.
    ///
    /// Entries are placed into their recorded containers while the URL at
    /// each position matches and container indices keep increasing. From the
    /// first mismatch on, every remaining entry gets its own container in
    /// the order given. Never fails: a partial restore is kept.
    #[must_use]
    pub fn restore(&self, live: Vec<TabEntry>) -> RestoredLayout {
        let mut layout = RestoredLayout::default();
        let mut current: Option<usize> = None;
        let mut following = true;

        for (position, entry) in live.into_iter().enumerate() {
            let record = self.records.get(position).filter(|r| {
                following
                    && r.url == entry.url
                    && current.is_none_or(|c| r.container_index >= c)
            });
            match record {
                Some(record) => {
                    layout.matched += 1;
                    if current == Some(record.container_index) {
                        if let Some((tabs, _)) = layout.groups.last_mut() {
                            tabs.push(entry);
                        }
                    } else {
                        current = Some(record.container_index);
                        layout.groups.push((vec![entry], record.collapsed));
                    }
                }
                None => {
                    if following {
                        debug!(position, "Snapshot correlation broke");
                    }
                    following = false;
                    layout.groups.push((vec![entry], false));
                }
            }
        }
        layout
    }

    /// Reads the snapshot stored for `window_id`.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Host` when storage fails and
    /// `SnapshotError::Deserialization` for a malformed value.
    pub async fn read_from(host: &dyn TabHost, key: &str, window_id: WindowId) -> SnapshotResult<Option<Self>> {
        match host.get_session_value(key, window_id).await? {
            Some(json) if json != "null" => Self::from_json(&json).map(Some),
            _ => Ok(None),
        }
    }

    /// Stores the snapshot for `window_id`. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Serialization` or `SnapshotError::Host`.
    pub async fn write_to(&self, host: &dyn TabHost, key: &str, window_id: WindowId) -> SnapshotResult<()> {
        let json = self.to_json()?;
        host.set_session_value(key, &json, window_id).await?;
        Ok(())
    }
}
