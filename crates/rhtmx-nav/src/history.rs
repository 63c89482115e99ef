//! Navigation history tracking
//!
//! Two bounded buffers live here: completed visits (what the user actually
//! saw) and guard attempts (every navigation the guard chain evaluated,
//! allowed or not). The loop guard reads the latter.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rhtmx_cache::{Clock, SystemClock};
use rhtmx_router::PathParams;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// One recorded navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

/// Route the user is currently on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoute {
    /// Concrete path, e.g. `/profile/alice`
    pub path: String,
    /// Slug of the matched descriptor, e.g. `/profile/:username`
    pub slug: String,
    pub params: PathParams,
    pub section: Option<String>,
}

impl ActiveRoute {
    pub fn new(path: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            slug: slug.into(),
            params: PathParams::new(),
            section: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationStatistics {
    pub total_navigations: usize,
    pub current_route: Option<String>,
    pub previous_route: Option<String>,
    pub can_go_back: bool,
    pub unique_routes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct HistoryState {
    current: Option<ActiveRoute>,
    previous: Option<ActiveRoute>,
    visits: VecDeque<HistoryEntry>,
    attempts: VecDeque<HistoryEntry>,
}

/// Bounded record of visits and guard attempts
pub struct NavigationHistory {
    state: Mutex<HistoryState>,
    max_visits: usize,
    max_attempts: usize,
    clock: Arc<dyn Clock>,
}

impl NavigationHistory {
    pub fn new(max_visits: usize, max_attempts: usize) -> Self {
        Self::with_clock(max_visits, max_attempts, Arc::new(SystemClock))
    }

    pub fn with_clock(max_visits: usize, max_attempts: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(HistoryState::default()),
            max_visits,
            max_attempts,
            clock,
        }
    }

    /// Make `route` current; the old current becomes previous
    pub fn set_current_active_route(&self, route: ActiveRoute) {
        let entry = HistoryEntry {
            path: route.path.clone(),
            timestamp: self.clock.now(),
        };

        let mut state = self.state.lock();
        if let Some(current) = state.current.take() {
            state.previous = Some(current);
        }
        debug!(
            path = %route.path,
            previous = ?state.previous.as_ref().map(|r| r.path.as_str()),
            "Active route changed"
        );
        state.current = Some(route);
        push_bounded(&mut state.visits, entry, self.max_visits);
    }

    pub fn current_active_route(&self) -> Option<ActiveRoute> {
        self.state.lock().current.clone()
    }

    pub fn current_active_path(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|r| r.path.clone())
    }

    pub fn previous_active_route(&self) -> Option<ActiveRoute> {
        self.state.lock().previous.clone()
    }

    pub fn previous_active_path(&self) -> Option<String> {
        self.state.lock().previous.as_ref().map(|r| r.path.clone())
    }

    /// More than one visit recorded
    pub fn can_navigate_back(&self) -> bool {
        self.state.lock().visits.len() > 1
    }

    pub fn is_on_path(&self, path: &str) -> bool {
        self.state
            .lock()
            .current
            .as_ref()
            .is_some_and(|route| route.path == path)
    }

    /// Check if `path` appears anywhere in the visit buffer
    pub fn was_previously_on_path(&self, path: &str) -> bool {
        self.state.lock().visits.iter().any(|entry| entry.path == path)
    }

    /// Most recent visits, oldest first; `None` returns the whole buffer
    pub fn navigation_history(&self, max_entries: Option<usize>) -> Vec<HistoryEntry> {
        let state = self.state.lock();
        let skip = match max_entries {
            Some(max) if max > 0 => state.visits.len().saturating_sub(max),
            _ => 0,
        };
        state.visits.iter().skip(skip).cloned().collect()
    }

    pub fn navigation_statistics(&self) -> NavigationStatistics {
        let state = self.state.lock();
        let unique: HashSet<&str> = state.visits.iter().map(|e| e.path.as_str()).collect();

        NavigationStatistics {
            total_navigations: state.visits.len(),
            current_route: state.current.as_ref().map(|r| r.path.clone()),
            previous_route: state.previous.as_ref().map(|r| r.path.clone()),
            can_go_back: state.visits.len() > 1,
            unique_routes: unique.len(),
            oldest_entry: state.visits.front().map(|e| e.timestamp),
            newest_entry: state.visits.back().map(|e| e.timestamp),
        }
    }

    /// Reset current, previous and all visits
    pub fn clear_navigation_history(&self) {
        let mut state = self.state.lock();
        state.current = None;
        state.previous = None;
        state.visits.clear();
        debug!("Navigation history cleared");
    }

    /// Append a guard attempt
    pub fn record_attempt(&self, path: &str) {
        let entry = HistoryEntry {
            path: path.to_string(),
            timestamp: self.clock.now(),
        };
        let mut state = self.state.lock();
        push_bounded(&mut state.attempts, entry, self.max_attempts);
    }

    /// Last `window` attempts, oldest first
    pub fn recent_attempts(&self, window: usize) -> Vec<String> {
        let state = self.state.lock();
        let skip = state.attempts.len().saturating_sub(window);
        state
            .attempts
            .iter()
            .skip(skip)
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Count `path` in the last `window` attempts, then record it
    ///
    /// Both steps happen under one lock so concurrent navigations can't
    /// interleave between the check and the record.
    pub fn count_then_record_attempt(&self, path: &str, window: usize) -> usize {
        let entry = HistoryEntry {
            path: path.to_string(),
            timestamp: self.clock.now(),
        };
        let mut state = self.state.lock();
        let skip = state.attempts.len().saturating_sub(window);
        let count = state
            .attempts
            .iter()
            .skip(skip)
            .filter(|attempt| attempt.path == path)
            .count();
        push_bounded(&mut state.attempts, entry, self.max_attempts);
        count
    }

    pub fn attempt_count(&self) -> usize {
        self.state.lock().attempts.len()
    }

    pub fn clear_attempts(&self) {
        self.state.lock().attempts.clear();
    }
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new(100, 50)
    }
}

impl std::fmt::Debug for NavigationHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NavigationHistory")
            .field("current", &state.current.as_ref().map(|r| &r.path))
            .field("visits", &state.visits.len())
            .field("attempts", &state.attempts.len())
            .finish()
    }
}

fn push_bounded(buffer: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, cap: usize) {
    buffer.push_back(entry);
    while buffer.len() > cap {
        buffer.pop_front();
    }
}
