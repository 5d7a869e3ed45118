use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::resolution::ResolutionTier;
use super::sort::SortMode;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Effective filter settings. `None` means "all" for every optional field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterState {
    /// Settled search query; empty disables the text filter.
    pub search_query: String,
    pub sort_by: SortMode,
    pub format: Option<String>,
    pub resolution: Option<ResolutionTier>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

/// Per-series part of the filter state, restored on series switch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub resolution: Option<ResolutionTier>,
    pub format: Option<String>,
}

impl SeriesFilter {
    pub fn capture(state: &FilterState) -> Self {
        Self {
            category: state.category.clone(),
            subcategory: state.subcategory.clone(),
            resolution: state.resolution,
            format: state.format.clone(),
        }
    }

    pub fn apply_to(&self, state: &mut FilterState) {
        state.category = self.category.clone();
        state.subcategory = self.subcategory.clone();
        state.resolution = self.resolution;
        state.format = self.format.clone();
    }
}

/// Settles a typed query once no new input has arrived for the window.
///
/// Callers pass the clock in, so the debounce never needs a timer task.
#[derive(Debug, Clone)]
pub struct SearchDebounce {
    window: Duration,
    pending: Option<(String, Instant)>,
    settled: String,
}

impl Default for SearchDebounce {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl SearchDebounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            settled: String::new(),
        }
    }

    pub fn push(&mut self, query: impl Into<String>, now: Instant) {
        self.pending = Some((query.into(), now));
    }

    /// Settle the pending query if its window has passed. Returns the newly
    /// settled query.
    pub fn poll(&mut self, now: Instant) -> Option<&str> {
        let ready = matches!(&self.pending, Some((_, at)) if now.duration_since(*at) >= self.window);
        if !ready {
            return None;
        }
        let (query, _) = self.pending.take()?;
        self.settled = query;
        Some(&self.settled)
    }

    /// Settle the pending query immediately.
    pub fn flush(&mut self) -> &str {
        if let Some((query, _)) = self.pending.take() {
            self.settled = query;
        }
        &self.settled
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn settled(&self) -> &str {
        &self.settled
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.settled.clear();
    }
}
