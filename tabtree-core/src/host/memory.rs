//! In-memory host simulator
//!
//! Keeps one tab list per window with pinned tabs as a prefix and queues the
//! events a real host would report. Events are not pushed to the engine;
//! callers take them or hand them over with [`InMemoryHost::deliver`], which
//! makes it possible to reorder a batch's confirmations in tests.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{HostError, HostResult, SyncResult};
use crate::models::{ChangeInfo, HostTab, HostWindow, MoveTarget, TabId, TabUpdate, WindowId};
use crate::sync::SyncEngine;

use super::{HostEvent, TabHost};

/// Parameters of a tab opened through [`InMemoryHost::open_tab_with`].
#[derive(Debug, Clone, Default)]
pub struct NewTab {
    url: String,
    index: Option<usize>,
    pinned: bool,
    opener: Option<TabId>,
    active: bool,
    window: Option<WindowId>,
}

impl NewTab {
    /// Unpinned tab opened at the end of the current window.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Opens the tab at `index` (clamped to its partition).
    #[must_use]
    pub const fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Opens the tab pinned.
    #[must_use]
    pub const fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Records `opener` as the tab that opened this one.
    #[must_use]
    pub const fn opened_by(mut self, opener: TabId) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Makes the new tab active.
    #[must_use]
    pub const fn active(mut self) -> Self {
        self.active = true;
        self
    }

    /// Opens the tab in another window.
    #[must_use]
    pub const fn in_window(mut self, window: WindowId) -> Self {
        self.window = Some(window);
        self
    }
}

#[derive(Debug, Default)]
struct WindowState {
    incognito: bool,
    tabs: Vec<HostTab>,
}

impl WindowState {
    fn pinned_count(&self) -> usize {
        self.tabs.iter().take_while(|t| t.pinned).count()
    }

    fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    fn reindex(&mut self, window_id: WindowId) {
        for (index, tab) in self.tabs.iter_mut().enumerate() {
            tab.index = index;
            tab.window_id = window_id;
        }
    }

    fn partition_range(&self, pinned: bool) -> (usize, usize) {
        let pinned_count = self.pinned_count();
        if pinned {
            (0, pinned_count)
        } else {
            (pinned_count, self.tabs.len())
        }
    }
}

#[derive(Debug)]
struct HostState {
    current: WindowId,
    windows: BTreeMap<WindowId, WindowState>,
    session: HashMap<(WindowId, String), String>,
    events: VecDeque<HostEvent>,
    next_tab: i64,
    fail_moves: usize,
    session_writes: usize,
}

impl HostState {
    fn window(&self, id: WindowId) -> HostResult<&WindowState> {
        self.windows.get(&id).ok_or(HostError::WindowNotFound(id))
    }

    fn window_mut(&mut self, id: WindowId) -> HostResult<&mut WindowState> {
        self.windows.get_mut(&id).ok_or(HostError::WindowNotFound(id))
    }

    fn find(&self, id: TabId) -> HostResult<(WindowId, usize)> {
        self.windows
            .iter()
            .find_map(|(wid, w)| w.position(id).map(|pos| (*wid, pos)))
            .ok_or(HostError::TabNotFound(id))
    }

    fn record(&self, id: TabId) -> HostResult<HostTab> {
        let (wid, pos) = self.find(id)?;
        Ok(self.window(wid)?.tabs[pos].clone())
    }

    fn alloc_tab(&mut self) -> TabId {
        let id = TabId(self.next_tab);
        self.next_tab += 1;
        id
    }

    fn insert(&mut self, window_id: WindowId, mut tab: HostTab, index: Option<usize>) -> HostResult<usize> {
        let window = self.window_mut(window_id)?;
        let (lo, hi) = window.partition_range(tab.pinned);
        let index = index.map_or(hi, |i| i.clamp(lo, hi));
        tab.window_id = window_id;
        window.tabs.insert(index, tab);
        window.reindex(window_id);
        Ok(index)
    }

    fn set_active(&mut self, id: TabId) -> HostResult<WindowId> {
        let (wid, pos) = self.find(id)?;
        let window = self.window_mut(wid)?;
        for (i, tab) in window.tabs.iter_mut().enumerate() {
            tab.active = i == pos;
        }
        Ok(wid)
    }

    fn updated(&mut self, id: TabId, change: ChangeInfo) -> HostResult<HostTab> {
        let tab = self.record(id)?;
        self.events.push_back(HostEvent::Updated {
            tab_id: id,
            change,
            tab: tab.clone(),
        });
        Ok(tab)
    }

    /// Moves one tab to the partition boundary after a pin state change.
    fn repin(&mut self, id: TabId, pinned: bool) -> HostResult<()> {
        let (wid, from) = self.find(id)?;
        let window = self.window_mut(wid)?;
        let mut tab = window.tabs.remove(from);
        tab.pinned = pinned;
        let to = window.pinned_count();
        window.tabs.insert(to, tab);
        window.reindex(wid);
        if from != to {
            self.events.push_back(HostEvent::Moved {
                tab_id: id,
                from_index: from,
                to_index: to,
                window_id: wid,
            });
        }
        Ok(())
    }

    fn move_block(&mut self, ids: &[TabId], target: MoveTarget) -> HostResult<Vec<HostTab>> {
        let wid = target.window_id;
        let mut block: Vec<TabId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !block.contains(id) {
                block.push(*id);
            }
        }
        let window = self.window_mut(wid)?;
        let mut pinned = None;
        for id in &block {
            let pos = window.position(*id).ok_or(HostError::TabNotFound(*id))?;
            let tab_pinned = window.tabs[pos].pinned;
            if pinned.is_some_and(|p| p != tab_pinned) {
                return Err(HostError::Rejected {
                    operation: "move_tabs",
                    reason: "cannot move pinned and unpinned tabs together".to_string(),
                });
            }
            pinned = Some(tab_pinned);
        }
        let Some(pinned) = pinned else {
            return Ok(Vec::new());
        };

        let rest: Vec<TabId> = window
            .tabs
            .iter()
            .map(|t| t.id)
            .filter(|id| !block.contains(id))
            .collect();
        let rest_pinned = window
            .tabs
            .iter()
            .filter(|t| t.pinned && !block.contains(&t.id))
            .count();
        let (lo, hi) = if pinned {
            (0, rest_pinned)
        } else {
            (rest_pinned, rest.len())
        };
        let index = usize::try_from(target.index).map_or(hi, |i| i.clamp(lo, hi));
        let predecessor = index.checked_sub(1).map(|i| rest[i]);

        let mut events = Vec::with_capacity(block.len());
        for (k, id) in block.iter().enumerate() {
            let from = window.position(*id).ok_or(HostError::TabNotFound(*id))?;
            let tab = window.tabs.remove(from);
            let anchor = if k == 0 { predecessor } else { Some(block[k - 1]) };
            let to = match anchor {
                Some(anchor) => window.position(anchor).map_or(0, |p| p + 1),
                None => 0,
            };
            window.tabs.insert(to, tab);
            events.push(HostEvent::Moved {
                tab_id: *id,
                from_index: from,
                to_index: to,
                window_id: wid,
            });
        }
        window.reindex(wid);
        let moved = block
            .iter()
            .filter_map(|id| window.position(*id).map(|p| window.tabs[p].clone()))
            .collect();
        self.events.extend(events);
        Ok(moved)
    }
}

/// Host simulator backing tests and the command-line replay tool.
#[derive(Debug)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    /// Creates a host whose current window is `window_id`.
    #[must_use]
    pub fn new(window_id: WindowId) -> Self {
        Self::with_incognito(window_id, false)
    }

    /// Creates a host whose current window has the given privacy mode.
    #[must_use]
    pub fn with_incognito(window_id: WindowId, incognito: bool) -> Self {
        let mut windows = BTreeMap::new();
        windows.insert(
            window_id,
            WindowState {
                incognito,
                tabs: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(HostState {
                current: window_id,
                windows,
                session: HashMap::new(),
                events: VecDeque::new(),
                next_tab: 1,
                fail_moves: 0,
                session_writes: 0,
            }),
        }
    }

    /// Adds another (non-current) window.
    pub async fn add_window(&self, window_id: WindowId, incognito: bool) {
        let mut state = self.state.lock().await;
        state
            .windows
            .entry(window_id)
            .or_insert_with(|| WindowState {
                incognito,
                tabs: Vec::new(),
            });
    }

    /// Adds a tab to the current window without reporting it.
    ///
    /// Used to set up the host before the engine loads.
    pub async fn seed_tab(&self, url: impl Into<String>, pinned: bool) -> TabId {
        let mut state = self.state.lock().await;
        let id = state.alloc_tab();
        let current = state.current;
        let mut tab = HostTab::new(id, current, 0, url);
        tab.pinned = pinned;
        // the current window always exists
        let _ = state.insert(current, tab, None);
        id
    }

    /// Opens an unpinned tab at the end of the current window.
    pub async fn open_tab(&self, url: impl Into<String>) -> TabId {
        self.open_tab_with(NewTab::new(url))
            .await
            .unwrap_or(TabId::NONE)
    }

    /// Opens a tab and reports it.
    ///
    /// # Errors
    ///
    /// Returns `HostError::WindowNotFound` for an unknown target window.
    pub async fn open_tab_with(&self, spec: NewTab) -> HostResult<TabId> {
        let mut state = self.state.lock().await;
        let window_id = spec.window.unwrap_or(state.current);
        state.window(window_id)?;
        let id = state.alloc_tab();
        let mut tab = HostTab::new(id, window_id, 0, spec.url);
        tab.pinned = spec.pinned;
        tab.opener_tab_id = spec.opener;
        state.insert(window_id, tab, spec.index)?;
        if spec.active {
            state.set_active(id)?;
        }
        let record = state.record(id)?;
        state.events.push_back(HostEvent::Created { tab: record });
        if spec.active {
            state.events.push_back(HostEvent::Activated { tab_id: id, window_id });
        }
        debug!(tab = %id, window = %window_id, "Host opened tab");
        Ok(id)
    }

    /// Closes a tab.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` for unknown tabs.
    pub async fn close_tab(&self, id: TabId) -> HostResult<()> {
        let mut state = self.state.lock().await;
        let (wid, pos) = state.find(id)?;
        let window = state.window_mut(wid)?;
        window.tabs.remove(pos);
        window.reindex(wid);
        state.events.push_back(HostEvent::Removed {
            tab_id: id,
            window_id: wid,
            is_window_closing: false,
        });
        Ok(())
    }

    /// Moves a single tab as if the user dragged it in the host's own strip.
    ///
    /// # Errors
    ///
    /// Returns `HostError` when the tab is unknown.
    pub async fn move_tab(&self, id: TabId, index: usize) -> HostResult<()> {
        let mut state = self.state.lock().await;
        let (wid, _) = state.find(id)?;
        state.move_block(&[id], MoveTarget::at(wid, index))?;
        Ok(())
    }

    /// Pins or unpins a tab from the host side.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` for unknown tabs.
    pub async fn pin_tab(&self, id: TabId, pinned: bool) -> HostResult<()> {
        self.update_tab(id, TabUpdate::pinned(pinned)).await.map(|_| ())
    }

    /// Navigates a tab to a new URL.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` for unknown tabs.
    pub async fn navigate(&self, id: TabId, url: impl Into<String>) -> HostResult<()> {
        let url = url.into();
        let mut state = self.state.lock().await;
        let (wid, pos) = state.find(id)?;
        state.window_mut(wid)?.tabs[pos].url.clone_from(&url);
        state.updated(
            id,
            ChangeInfo {
                url: Some(url),
                ..ChangeInfo::default()
            },
        )?;
        Ok(())
    }

    /// Makes a tab active.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` for unknown tabs.
    pub async fn activate(&self, id: TabId) -> HostResult<()> {
        self.update_tab(id, TabUpdate::activate()).await.map(|_| ())
    }

    /// Replaces the highlighted set of the tabs' window.
    ///
    /// # Errors
    ///
    /// Returns `HostError::TabNotFound` if any tab is unknown.
    pub async fn highlight(&self, ids: &[TabId]) -> HostResult<()> {
        let mut state = self.state.lock().await;
        let window_id = match ids.first() {
            Some(first) => state.find(*first)?.0,
            None => state.current,
        };
        for id in ids {
            state.find(*id)?;
        }
        let window = state.window_mut(window_id)?;
        for tab in &mut window.tabs {
            tab.highlighted = ids.contains(&tab.id);
        }
        state.events.push_back(HostEvent::Highlighted {
            tab_ids: ids.to_vec(),
            window_id,
        });
        Ok(())
    }

    /// Moves a tab to the end of another window (detach, then attach).
    ///
    /// # Errors
    ///
    /// Returns `HostError` when the tab or the window is unknown.
    pub async fn transfer_tab(&self, id: TabId, to_window: WindowId) -> HostResult<()> {
        let mut state = self.state.lock().await;
        state.window(to_window)?;
        let (from_window, pos) = state.find(id)?;
        let window = state.window_mut(from_window)?;
        let tab = window.tabs.remove(pos);
        window.reindex(from_window);
        state.events.push_back(HostEvent::Detached {
            tab_id: id,
            old_window_id: from_window,
        });
        let new_position = state.insert(to_window, tab, None)?;
        state.events.push_back(HostEvent::Attached {
            tab_id: id,
            new_position,
            new_window_id: to_window,
        });
        Ok(())
    }

    /// Makes the next `count` calls to `move_tabs` fail.
    pub async fn fail_next_moves(&self, count: usize) {
        self.state.lock().await.fail_moves = count;
    }

    /// Removes and returns every queued event.
    pub async fn take_events(&self) -> Vec<HostEvent> {
        self.state.lock().await.events.drain(..).collect()
    }

    /// Number of queued events.
    pub async fn pending_events(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Feeds queued events to `engine` until the queue is empty.
    ///
    /// Events produced while handling (follow-up moves) are delivered too.
    /// Returns how many events were delivered.
    ///
    /// # Errors
    ///
    /// Stops at the first handler error.
    pub async fn deliver(&self, engine: &mut SyncEngine) -> SyncResult<usize> {
        let mut delivered = 0;
        loop {
            let next = self.state.lock().await.events.pop_front();
            let Some(event) = next else {
                return Ok(delivered);
            };
            engine.handle_event(event).await?;
            delivered += 1;
        }
    }

    /// Current tab records of a window, in host order.
    pub async fn tabs(&self, window_id: WindowId) -> Vec<HostTab> {
        self.state
            .lock()
            .await
            .windows
            .get(&window_id)
            .map(|w| w.tabs.clone())
            .unwrap_or_default()
    }

    /// Tab ids of a window, in host order.
    pub async fn tab_ids(&self, window_id: WindowId) -> Vec<TabId> {
        self.tabs(window_id).await.iter().map(|t| t.id).collect()
    }

    /// Reads a stored session value without going through the trait.
    pub async fn stored_value(&self, key: &str, window_id: WindowId) -> Option<String> {
        self.state
            .lock()
            .await
            .session
            .get(&(window_id, key.to_string()))
            .cloned()
    }

    /// Stores a session value without counting it as a write.
    pub async fn preload_value(&self, key: &str, value: impl Into<String>, window_id: WindowId) {
        self.state
            .lock()
            .await
            .session
            .insert((window_id, key.to_string()), value.into());
    }

    /// Number of `set_session_value` calls so far.
    pub async fn session_writes(&self) -> usize {
        self.state.lock().await.session_writes
    }
}

#[async_trait]
impl TabHost for InMemoryHost {
    async fn move_tabs(&self, ids: &[TabId], target: MoveTarget) -> HostResult<Vec<HostTab>> {
        let mut state = self.state.lock().await;
        if state.fail_moves > 0 {
            state.fail_moves -= 1;
            return Err(HostError::Rejected {
                operation: "move_tabs",
                reason: "injected failure".to_string(),
            });
        }
        state.move_block(ids, target)
    }

    async fn update_tab(&self, id: TabId, update: TabUpdate) -> HostResult<HostTab> {
        let mut state = self.state.lock().await;
        let (wid, pos) = state.find(id)?;
        let current = state.window(wid)?.tabs[pos].clone();
        let mut change = ChangeInfo::default();
        if let Some(pinned) = update.pinned.filter(|p| *p != current.pinned) {
            state.repin(id, pinned)?;
            change.pinned = Some(pinned);
        }
        if let Some(muted) = update.muted.filter(|m| *m != current.muted) {
            let (wid, pos) = state.find(id)?;
            state.window_mut(wid)?.tabs[pos].muted = muted;
            change.muted = Some(muted);
        }
        if !change.is_empty() {
            state.updated(id, change)?;
        }
        if update.active == Some(true) && !current.active {
            let window_id = state.set_active(id)?;
            state.events.push_back(HostEvent::Activated { tab_id: id, window_id });
        }
        state.record(id)
    }

    async fn query_tab(&self, id: TabId) -> HostResult<HostTab> {
        self.state.lock().await.record(id)
    }

    async fn query_all_tabs(&self, window_id: WindowId) -> HostResult<Vec<HostTab>> {
        Ok(self.state.lock().await.window(window_id)?.tabs.clone())
    }

    async fn current_window(&self, populate: bool) -> HostResult<HostWindow> {
        let state = self.state.lock().await;
        let window = state.window(state.current)?;
        Ok(HostWindow {
            id: state.current,
            incognito: window.incognito,
            tabs: populate.then(|| window.tabs.clone()),
        })
    }

    async fn get_session_value(&self, key: &str, window_id: WindowId) -> HostResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .await
            .session
            .get(&(window_id, key.to_string()))
            .cloned())
    }

    async fn set_session_value(&self, key: &str, value: &str, window_id: WindowId) -> HostResult<()> {
        let mut state = self.state.lock().await;
        state.window(window_id)?;
        state.session_writes += 1;
        state
            .session
            .insert((window_id, key.to_string()), value.to_string());
        Ok(())
    }
}
