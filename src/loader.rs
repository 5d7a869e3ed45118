//! Aggregate loader: merges per-category lists into the visible collection.
//!
//! A series opens in two steps. The first few categories are loaded in
//! parallel and published at once, then the rest are filled in the
//! background in small batches and appended in one atomic step at the end,
//! so readers never see a half-merged collection.

mod daily;

use futures_util::future::{join_all, try_join_all};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, WallpaperItem};
use crate::error::{LoadError, LoadFailure};
use crate::series;
use crate::utils::{format_file_size, lock, read, write};

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Categories loaded before the first paint.
    pub initial_categories: usize,
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            initial_categories: 3,
            batch_size: 3,
            batch_pause: Duration::from_millis(150),
        }
    }
}

/// Shared cancellation flag for one background fill.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Consistent view of the loader, taken under one lock.
#[derive(Debug, Clone, Default)]
pub struct LoaderSnapshot {
    pub series: Option<String>,
    pub items: Arc<Vec<WallpaperItem>>,
    pub loading: bool,
    pub background_loading: bool,
    pub expected_total: usize,
    pub display_total: usize,
    pub error: Option<LoadFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total: usize,
    pub jpg: usize,
    pub png: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
}

#[derive(Debug, Default)]
struct LoaderState {
    series: Option<String>,
    items: Arc<Vec<WallpaperItem>>,
    loading: bool,
    background_loading: bool,
    expected_total: usize,
    error: Option<LoadFailure>,
    /// Category (or year) files merged into `items`.
    loaded_files: HashSet<String>,
    /// Bumped on every series switch; stale tasks compare before writing.
    generation: u64,
}

impl LoaderState {
    fn snapshot(&self) -> LoaderSnapshot {
        let display_total = if self.background_loading && self.expected_total > 0 {
            self.expected_total
        } else {
            self.items.len()
        };
        LoaderSnapshot {
            series: self.series.clone(),
            items: self.items.clone(),
            loading: self.loading,
            background_loading: self.background_loading,
            expected_total: self.expected_total,
            display_total,
            error: self.error.clone(),
        }
    }

    fn append(&mut self, files: impl IntoIterator<Item = String>, extra: Vec<WallpaperItem>) {
        let mut merged = Vec::with_capacity(self.items.len() + extra.len());
        merged.extend(self.items.iter().cloned());
        merged.extend(extra);
        self.items = Arc::new(merged);
        self.loaded_files.extend(files);
    }
}

struct Background {
    token: CancelToken,
}

pub struct Loader {
    catalog: Arc<CatalogStore>,
    options: LoaderOptions,
    state: Arc<RwLock<LoaderState>>,
    background: Mutex<Option<Background>>,
    updates: Arc<watch::Sender<LoaderSnapshot>>,
}

impl Loader {
    pub fn new(catalog: Arc<CatalogStore>, options: LoaderOptions) -> Self {
        let (updates, _) = watch::channel(LoaderSnapshot::default());
        Self {
            catalog,
            options,
            state: Arc::new(RwLock::new(LoaderState::default())),
            background: Mutex::new(None),
            updates: Arc::new(updates),
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        read(&self.state).snapshot()
    }

    /// Receiver that sees a new snapshot after every atomic step.
    pub fn subscribe(&self) -> watch::Receiver<LoaderSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.updates.send_replace(snapshot);
    }

    /// Stop the running background fill, if any. Its in-flight fetches
    /// finish but their results are dropped.
    pub fn cancel_background(&self) {
        if let Some(background) = lock(&self.background).take() {
            background.token.cancel();
            debug!("background fill cancelled");
        }
        write(&self.state).background_loading = false;
        self.publish();
    }

    /// Wait until no background fill is running. Any number of callers may
    /// wait at once.
    pub async fn wait_for_background(&self) {
        let mut updates = self.updates.subscribe();
        loop {
            let running = read(&self.state).background_loading;
            if !running || updates.changed().await.is_err() {
                break;
            }
        }
    }

    /// Open a series: index, first categories, then a background fill.
    ///
    /// Does nothing when the series is already open with data, unless
    /// `force` is set.
    pub async fn init_series(&self, series: &str, force: bool) -> Result<(), LoadError> {
        {
            let state = read(&self.state);
            if !force
                && state.series.as_deref() == Some(series)
                && !state.items.is_empty()
                && state.error.is_none()
            {
                debug!(series, "series already loaded");
                return Ok(());
            }
        }

        self.cancel_background();
        let generation = {
            let mut state = write(&self.state);
            state.generation += 1;
            state.series = Some(series.to_string());
            state.items = Arc::new(Vec::new());
            state.loaded_files.clear();
            state.loading = true;
            state.background_loading = false;
            state.expected_total = 0;
            state.error = None;
            state.generation
        };
        self.publish();

        let result = if series::is_daily(series) {
            self.init_daily(series, force, generation).await
        } else {
            self.init_categories(series, force, generation).await
        };

        if let Err(e) = &result {
            self.record_failure(series, generation, e);
        }
        result
    }

    fn record_failure(&self, series: &str, generation: u64, err: &LoadError) {
        {
            let mut state = write(&self.state);
            if state.generation != generation {
                return;
            }
            state.items = Arc::new(Vec::new());
            state.loaded_files.clear();
            state.loading = false;
            state.background_loading = false;
            state.error = Some(LoadFailure::from_error(err, series));
        }
        self.publish();
    }

    async fn init_categories(
        &self,
        series: &str,
        force: bool,
        generation: u64,
    ) -> Result<(), LoadError> {
        let index = self.catalog.load_series_index(series, force).await?;
        {
            let mut state = write(&self.state);
            if state.generation != generation {
                debug!(series, "series switched while its index loaded");
                return Ok(());
            }
            state.expected_total = index.total;
        }

        let split = self.options.initial_categories.min(index.categories.len());
        let (first, rest) = index.categories.split_at(split);

        let lists = try_join_all(
            first
                .iter()
                .map(|category| self.catalog.load_category(series, &category.file)),
        )
        .await?;

        let remaining: Vec<String> = rest.iter().map(|c| c.file.clone()).collect();
        {
            let mut state = write(&self.state);
            if state.generation != generation {
                return Ok(());
            }
            state.items = Arc::new(lists.iter().flat_map(|l| l.iter().cloned()).collect());
            state.loaded_files = first.iter().map(|c| c.file.clone()).collect();
            state.loading = false;
            state.background_loading = !remaining.is_empty();
        }
        self.publish();
        info!(
            series,
            loaded = split,
            remaining = remaining.len(),
            "first categories loaded"
        );

        if !remaining.is_empty() {
            self.spawn_fill(series, remaining, generation);
        }
        Ok(())
    }

    fn spawn_fill(&self, series: &str, files: Vec<String>, generation: u64) {
        let token = CancelToken::new();
        let fill = BackgroundFill {
            catalog: self.catalog.clone(),
            state: self.state.clone(),
            updates: self.updates.clone(),
            options: self.options,
            series: series.to_string(),
            token: token.clone(),
            generation,
        };
        tokio::spawn(fill.run(files));
        *lock(&self.background) = Some(Background { token });
    }

    /// Load every category of the open series that is not merged yet.
    pub async fn load_all_categories(&self, series: &str) -> Result<(), LoadError> {
        if series::is_daily(series) {
            return Ok(());
        }

        self.cancel_background();
        let index = self.catalog.load_series_index(series, false).await?;
        let (generation, pending) = {
            let state = read(&self.state);
            if state.series.as_deref() != Some(series) {
                return Ok(());
            }
            let pending: Vec<String> = index
                .categories
                .iter()
                .filter(|c| !state.loaded_files.contains(&c.file))
                .map(|c| c.file.clone())
                .collect();
            (state.generation, pending)
        };
        if pending.is_empty() {
            return Ok(());
        }

        write(&self.state).loading = true;
        self.publish();

        let results = join_all(
            pending
                .iter()
                .map(|file| self.catalog.load_category(series, file)),
        )
        .await;

        {
            let mut state = write(&self.state);
            state.loading = false;
            if state.generation == generation {
                let mut files = Vec::new();
                let mut extra = Vec::new();
                for (file, result) in pending.into_iter().zip(results) {
                    match result {
                        Ok(items) => {
                            extra.extend(items.iter().cloned());
                            files.push(file);
                        }
                        Err(e) => warn!(series, file = %file, error = %e, "category load failed"),
                    }
                }
                state.append(files, extra);
            }
        }
        self.publish();
        Ok(())
    }

    pub fn wallpaper_by_id(&self, id: &str) -> Option<WallpaperItem> {
        read(&self.state).items.iter().find(|w| w.id == id).cloned()
    }

    pub fn wallpaper_index(&self, id: &str) -> Option<usize> {
        read(&self.state).items.iter().position(|w| w.id == id)
    }

    pub fn prev_wallpaper(&self, id: &str) -> Option<WallpaperItem> {
        let state = read(&self.state);
        let index = state.items.iter().position(|w| w.id == id)?;
        index.checked_sub(1).map(|i| state.items[i].clone())
    }

    pub fn next_wallpaper(&self, id: &str) -> Option<WallpaperItem> {
        let state = read(&self.state);
        let index = state.items.iter().position(|w| w.id == id)?;
        state.items.get(index + 1).cloned()
    }

    pub fn statistics(&self) -> Statistics {
        let state = read(&self.state);
        let items = &state.items;
        let jpg = items
            .iter()
            .filter(|w| matches!(w.format.as_str(), "JPG" | "JPEG"))
            .count();
        let png = items.iter().filter(|w| w.format == "PNG").count();
        let total_size: u64 = items.iter().map(|w| w.size).sum();
        Statistics {
            total: items.len(),
            jpg,
            png,
            total_size,
            total_size_formatted: format_file_size(total_size),
        }
    }

    /// Forget the open series and everything merged for it.
    pub fn reset(&self) {
        self.cancel_background();
        {
            let mut state = write(&self.state);
            let generation = state.generation + 1;
            *state = LoaderState {
                generation,
                ..LoaderState::default()
            };
        }
        self.publish();
    }
}

struct BackgroundFill {
    catalog: Arc<CatalogStore>,
    state: Arc<RwLock<LoaderState>>,
    updates: Arc<watch::Sender<LoaderSnapshot>>,
    options: LoaderOptions,
    series: String,
    token: CancelToken,
    generation: u64,
}

impl BackgroundFill {
    async fn run(self, files: Vec<String>) {
        let series = self.series.as_str();
        let batch_size = self.options.batch_size.max(1);
        let mut loaded_files = Vec::new();
        let mut buffered = Vec::new();

        for (n, batch) in files.chunks(batch_size).enumerate() {
            if n > 0 {
                tokio::time::sleep(self.options.batch_pause).await;
            }
            if self.token.is_cancelled() {
                debug!(series, "background fill stopped before batch");
                return;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|file| self.catalog.load_category(series, file)),
            )
            .await;

            if self.token.is_cancelled() {
                debug!(series, "background fill stopped after batch");
                return;
            }

            // A batch lands whole or not at all.
            match results.into_iter().collect::<Result<Vec<_>, _>>() {
                Ok(lists) => {
                    buffered.extend(lists.iter().flat_map(|l| l.iter().cloned()));
                    loaded_files.extend(batch.iter().cloned());
                }
                Err(e) => {
                    warn!(series, batch = n, files = ?batch, error = %e, "skipping batch in background fill")
                }
            }
        }

        let snapshot = {
            let mut state = write(&self.state);
            if state.generation != self.generation || self.token.is_cancelled() {
                return;
            }
            let added = buffered.len();
            state.append(loaded_files, buffered);
            state.background_loading = false;
            info!(series, added, total = state.items.len(), "background fill complete");
            state.snapshot()
        };
        self.updates.send_replace(snapshot);
    }
}
