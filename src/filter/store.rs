use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::options::{category_options, subcategory_options, CategoryOption};
use super::resolution::ResolutionTier;
use super::sort::SortMode;
use super::state::{FilterState, SearchDebounce, SeriesFilter};
use crate::catalog::{SubcategoryEntry, WallpaperItem};
use crate::popularity::PopularitySnapshot;
use crate::series;
use crate::settings::{SettingsStore, KEY_CATEGORY, KEY_SERIES_FILTERS, KEY_SORT};

const ALL: &str = "all";

/// Category a daily series opens on: the current month.
fn current_year_month() -> String {
    Local::now().format("%Y-%m").to_string()
}

#[derive(Clone)]
struct ResultKey {
    items: Arc<Vec<WallpaperItem>>,
    state: FilterState,
    popularity_revision: u64,
    popularity_loading: bool,
    skip_category: bool,
}

impl ResultKey {
    fn matches(&self, other: &ResultKey) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
            && self.state == other.state
            && self.popularity_revision == other.popularity_revision
            && self.popularity_loading == other.popularity_loading
            && self.skip_category == other.skip_category
    }
}

/// Filter state of the gallery with persistence and memoized views.
pub struct FilterStore {
    state: FilterState,
    debounce: SearchDebounce,
    current_series: Option<String>,
    series_cache: HashMap<String, SeriesFilter>,
    options_cache: Option<(usize, Arc<Vec<CategoryOption>>)>,
    result_cache: Option<(ResultKey, Arc<Vec<WallpaperItem>>)>,
    settings: Arc<SettingsStore>,
}

impl FilterStore {
    /// Restore sort, category and per-series filters from settings.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let sort_by = settings
            .get::<String>(KEY_SORT)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let category = settings
            .get::<String>(KEY_CATEGORY)
            .filter(|c| c != ALL && !c.is_empty());
        let series_cache = settings
            .get::<HashMap<String, SeriesFilter>>(KEY_SERIES_FILTERS)
            .unwrap_or_default();

        Self {
            state: FilterState {
                sort_by,
                category,
                ..FilterState::default()
            },
            debounce: SearchDebounce::default(),
            current_series: None,
            series_cache,
            options_cache: None,
            result_cache: None,
            settings,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn current_series(&self) -> Option<&str> {
        self.current_series.as_deref()
    }

    fn persist<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.settings.set(key, value) {
            warn!(key, error = %e, "failed to save setting");
        }
    }

    fn persist_category(&self) {
        self.persist(KEY_CATEGORY, self.state.category.as_deref().unwrap_or(ALL));
    }

    /// Record typed input. It takes effect once it settles, see [`Self::tick`].
    pub fn set_search_query(&mut self, query: impl Into<String>, now: Instant) {
        self.debounce.push(query, now);
    }

    /// Apply the typed query if it has settled. Returns true when the
    /// effective query changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(query) if query != self.state.search_query => {
                self.state.search_query = query.to_string();
                true
            }
            _ => false,
        }
    }

    /// Apply the typed query immediately.
    pub fn flush_search(&mut self) {
        let query = self.debounce.flush().to_string();
        self.state.search_query = query;
    }

    pub fn set_sort(&mut self, mode: SortMode) {
        self.state.sort_by = mode;
        self.persist(KEY_SORT, mode.as_str());
    }

    /// Select a primary category. Always resets the subcategory.
    pub fn set_category(&mut self, category: Option<String>) {
        self.state.category = category.filter(|c| c != ALL);
        self.state.subcategory = None;
        self.persist_category();
    }

    pub fn set_subcategory(&mut self, subcategory: Option<String>) {
        self.state.subcategory = subcategory.filter(|s| s != ALL);
    }

    pub fn set_format(&mut self, format: Option<String>) {
        self.state.format = format.filter(|f| f != ALL);
    }

    pub fn set_resolution(&mut self, tier: Option<ResolutionTier>) {
        self.state.resolution = tier;
    }

    fn default_category(series: &str) -> Option<String> {
        series::is_daily(series).then(current_year_month)
    }

    pub fn reset_filters(&mut self, default_sort: SortMode, series: &str) {
        self.debounce.clear();
        self.state = FilterState {
            sort_by: default_sort,
            category: Self::default_category(series),
            ..FilterState::default()
        };
        self.persist(KEY_SORT, default_sort.as_str());
        self.persist_category();
    }

    /// Whether anything differs from the series' defaults.
    pub fn has_active_filters(&self, series: &str) -> bool {
        !self.state.search_query.is_empty()
            || self.state.format.is_some()
            || self.state.resolution.is_some()
            || self.state.subcategory.is_some()
            || self.state.category != Self::default_category(series)
    }

    pub fn save_current_series_filter(&mut self) {
        let Some(series) = self.current_series.clone() else {
            return;
        };
        self.series_cache
            .insert(series, SeriesFilter::capture(&self.state));
        self.persist(KEY_SERIES_FILTERS, &self.series_cache);
    }

    pub fn restore_series_filter(&mut self, series: &str) -> bool {
        match self.series_cache.get(series) {
            Some(cached) => {
                cached.apply_to(&mut self.state);
                true
            }
            None => false,
        }
    }

    /// Save the outgoing series' filters and make `series` current.
    pub fn switch_series(&mut self, series: &str) {
        self.save_current_series_filter();
        self.current_series = Some(series.to_string());
        self.clear_category_cache();
    }

    /// Switch to a series and apply its saved filters, or its defaults.
    pub fn set_default_sort_by_series(&mut self, series: &str) {
        self.switch_series(series);
        self.state.sort_by = SortMode::Newest;

        if self.restore_series_filter(series) {
            debug!(series, "restored series filters");
            return;
        }

        self.state.resolution = None;
        self.state.format = None;
        self.state.subcategory = None;
        self.state.category = Self::default_category(series);
        if series::is_daily(series) {
            if let Err(e) = self.settings.remove(KEY_CATEGORY) {
                warn!(error = %e, "failed to clear saved category");
            }
        }
    }

    pub fn clear_category_cache(&mut self) {
        self.options_cache = None;
        self.result_cache = None;
    }

    /// Category picker for a collection, recomputed when its length changes.
    pub fn category_options(&mut self, items: &[WallpaperItem]) -> Arc<Vec<CategoryOption>> {
        if let Some((len, options)) = &self.options_cache {
            if *len == items.len() {
                return options.clone();
            }
        }
        let options = Arc::new(category_options(items));
        self.options_cache = Some((items.len(), options.clone()));
        options
    }

    pub fn subcategory_options(&mut self, items: &[WallpaperItem]) -> Vec<SubcategoryEntry> {
        let options = self.category_options(items);
        subcategory_options(&options, self.state.category.as_deref()).to_vec()
    }

    /// Visible items, recomputed only when the collection, the filter state
    /// or the popularity data changed.
    pub fn filtered_and_sorted(
        &mut self,
        items: &Arc<Vec<WallpaperItem>>,
        popularity: &PopularitySnapshot,
        skip_category: bool,
    ) -> Arc<Vec<WallpaperItem>> {
        let key = ResultKey {
            items: items.clone(),
            state: self.state.clone(),
            popularity_revision: popularity.revision,
            popularity_loading: popularity.loading,
            skip_category,
        };
        if let Some((cached_key, result)) = &self.result_cache {
            if cached_key.matches(&key) {
                return result.clone();
            }
        }

        let result = Arc::new(super::filtered_and_sorted(
            items,
            &self.state,
            popularity,
            skip_category,
        ));
        self.result_cache = Some((key, result.clone()));
        result
    }
}
