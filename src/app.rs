//! The gallery context: one object owning every store of a session.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, CdnUrls, WallpaperItem};
use crate::config::Config;
use crate::error::LoadError;
use crate::fetch::{HttpTransport, LocalTransport, Transport};
use crate::filter::{CategoryOption, FilterStore};
use crate::loader::{Loader, LoaderSnapshot};
use crate::popularity::{PopularityClient, PopularitySnapshot, PopularityStore};
use crate::series::{self, DataUrls, DEFAULT_SERIES};
use crate::settings::{SettingsStore, KEY_CURRENT_SERIES};
use crate::stats::StatsService;
use crate::utils::lock;

const SETTINGS_FILE: &str = "settings.json";

/// Everything a gallery session needs, wired together.
///
/// Cloning is not supported; share it behind an `Arc` when several tasks
/// need it.
pub struct Gallery {
    settings: Arc<SettingsStore>,
    catalog: Arc<CatalogStore>,
    loader: Loader,
    filters: Mutex<FilterStore>,
    stats: Arc<StatsService>,
    popularity: PopularityStore,
    client: Option<Arc<PopularityClient>>,
}

impl Gallery {
    /// Build a gallery from configuration: an HTTP transport when the data
    /// source is a URL, a local mirror otherwise.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (transport, data): (Arc<dyn Transport>, DataUrls) = if config.catalog.is_remote() {
            (
                Arc::new(HttpTransport::new()),
                DataUrls::new(config.catalog.data_source.as_str()),
            )
        } else {
            let root = config.catalog.local_root();
            if !root.is_dir() {
                warn!(path = %root.display(), "local data source does not exist");
            }
            (Arc::new(LocalTransport::new(root)), DataUrls::new(""))
        };

        let state_dir = config.state_dir();
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create state dir {}", state_dir.display()))?;
        let settings = Arc::new(SettingsStore::open(state_dir.join(SETTINGS_FILE)));

        Ok(Self::new(config, transport, data, settings, Some(state_dir)))
    }

    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        data: DataUrls,
        settings: Arc<SettingsStore>,
        cache_dir: Option<std::path::PathBuf>,
    ) -> Self {
        let cdn = CdnUrls::new(
            config.catalog.cdn_base.as_str(),
            config.catalog.default_cdn_tag.as_str(),
        );
        let catalog = Arc::new(CatalogStore::new(
            transport.clone(),
            data.clone(),
            cdn,
            config.catalog_options(),
        ));
        let loader = Loader::new(catalog.clone(), config.loader.options());

        let popularity_config = &config.popularity;
        let client = popularity_config
            .backend()
            .map(|(url, key)| Arc::new(PopularityClient::new(transport.clone(), url, key)));

        let mut stats = StatsService::new(transport, data, cache_dir)
            .with_ttl(Duration::from_secs(popularity_config.stats_ttl_secs));
        if let Some(client) = &client {
            stats = stats.with_backend(client.clone(), popularity_config.ranked_limit);
        }
        let stats = Arc::new(stats);

        let popularity = PopularityStore::new(
            client.clone(),
            Some(stats.clone()),
            Duration::from_secs(popularity_config.ttl_secs),
            popularity_config.ranked_limit,
        );

        Self {
            filters: Mutex::new(FilterStore::new(settings.clone())),
            settings,
            catalog,
            loader,
            stats,
            popularity,
            client,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn stats(&self) -> &Arc<StatsService> {
        &self.stats
    }

    pub fn popularity(&self) -> &PopularityStore {
        &self.popularity
    }

    /// Filter state. Do not hold the guard across an `.await`.
    pub fn filters(&self) -> MutexGuard<'_, FilterStore> {
        lock(&self.filters)
    }

    /// The series opened last time, or the default one.
    pub fn last_series(&self) -> String {
        self.settings
            .get::<String>(KEY_CURRENT_SERIES)
            .filter(|s| series::lookup(s).is_some())
            .unwrap_or_else(|| DEFAULT_SERIES.to_string())
    }

    /// Switch to `series`: restore its filters, load its first page and its
    /// popularity data side by side.
    pub async fn open_series(&self, series: &str, force: bool) -> Result<LoaderSnapshot, LoadError> {
        if series::lookup(series).is_none() {
            return Err(LoadError::UnknownSeries(series.to_string()));
        }

        self.filters().set_default_sort_by_series(series);
        if let Err(e) = self.settings.set(KEY_CURRENT_SERIES, series) {
            warn!(error = %e, "failed to save current series");
        }

        let (result, ()) = tokio::join!(
            self.loader.init_series(series, force),
            self.popularity.fetch(series, force)
        );
        result?;

        let snapshot = self.loader.snapshot();
        info!(series, items = snapshot.items.len(), "series opened");
        Ok(snapshot)
    }

    /// Wait for the open series' background fill to finish.
    pub async fn wait_for_background(&self) {
        self.loader.wait_for_background().await;
    }

    pub fn popularity_snapshot(&self) -> PopularitySnapshot {
        self.popularity.snapshot()
    }

    /// The filtered and sorted view of the open series.
    pub fn visible(&self) -> Arc<Vec<WallpaperItem>> {
        let items = self.loader.snapshot().items;
        let popularity = self.popularity.snapshot();
        self.filters()
            .filtered_and_sorted(&items, &popularity, false)
    }

    pub fn category_options(&self) -> Arc<Vec<CategoryOption>> {
        let items = self.loader.snapshot().items;
        self.filters().category_options(&items)
    }

    pub async fn record_view(&self, item: &WallpaperItem) {
        if let (Some(client), Some(series)) = (&self.client, self.loader.snapshot().series) {
            client.record_view(item, &series).await;
        }
    }

    /// Drop every cached catalog, merged collection and popularity map.
    /// Settings and the on-disk stats cache are kept.
    pub fn clear_data(&self) {
        self.loader.reset();
        self.catalog.clear_cache(None);
        self.popularity.clear_data();
        self.filters().clear_category_cache();
        debug!("gallery data cleared");
    }
}
