//! View/download popularity, keyed by image filename.
//!
//! Ranked lists come from an optional RPC backend. Without one, the all-time
//! ranking is derived from the static stats snapshot and the windowed
//! rankings stay empty. Missing data never fails a caller; it ranks as zero.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::catalog::WallpaperItem;
use crate::error::LoadError;
use crate::fetch::Transport;
use crate::stats::{StatsService, ViewStats};
use crate::utils::{read, write};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RANKED_LIMIT: usize = 100;

/// Ranking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    All,
    Weekly,
    Monthly,
}

impl Window {
    pub fn days(&self) -> Option<u32> {
        match self {
            Window::All => None,
            Window::Weekly => Some(7),
            Window::Monthly => Some(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularityRecord {
    pub filename: String,
    pub view_count: u64,
    pub download_count: u64,
    pub popularity_score: u64,
}

impl PopularityRecord {
    pub fn new(filename: impl Into<String>, views: u64, downloads: u64) -> Self {
        Self {
            filename: filename.into(),
            view_count: views,
            download_count: downloads,
            popularity_score: views + 2 * downloads,
        }
    }
}

// Backends disagree on column names; accept all of them.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "image_id")]
    filename: String,
    #[serde(default, alias = "views", alias = "total_views")]
    view_count: u64,
    #[serde(default, alias = "downloads", alias = "total_downloads")]
    download_count: u64,
    #[serde(default)]
    popularity_score: Option<u64>,
}

impl From<RawRecord> for PopularityRecord {
    fn from(raw: RawRecord) -> Self {
        let mut record = PopularityRecord::new(raw.filename, raw.view_count, raw.download_count);
        if let Some(score) = raw.popularity_score {
            record.popularity_score = score;
        }
        record
    }
}

/// Lookup entry of a ranking; `rank` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopularityEntry {
    pub rank: usize,
    pub score: u64,
    pub downloads: u64,
    pub views: u64,
}

/// Index records by filename. Records are expected best first; the first
/// occurrence of a filename wins.
pub fn rank_map(records: &[PopularityRecord]) -> HashMap<String, PopularityEntry> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        if map.contains_key(&record.filename) {
            continue;
        }
        let rank = map.len() + 1;
        map.insert(
            record.filename.clone(),
            PopularityEntry {
                rank,
                score: record.popularity_score,
                downloads: record.download_count,
                views: record.view_count,
            },
        );
    }
    map
}

/// Read-only view of the popularity store.
#[derive(Debug, Clone, Default)]
pub struct PopularitySnapshot {
    pub series: String,
    pub loading: bool,
    pub all: Arc<HashMap<String, PopularityEntry>>,
    pub weekly: Arc<HashMap<String, PopularityEntry>>,
    pub monthly: Arc<HashMap<String, PopularityEntry>>,
    /// Bumped whenever the maps are replaced.
    pub revision: u64,
}

impl PopularitySnapshot {
    /// Map for a window; an empty windowed map falls back to all-time.
    pub fn map_for(&self, window: Window) -> &HashMap<String, PopularityEntry> {
        let map = match window {
            Window::All => &self.all,
            Window::Weekly => &self.weekly,
            Window::Monthly => &self.monthly,
        };
        if map.is_empty() {
            &self.all
        } else {
            map
        }
    }

    pub fn has_data(&self) -> bool {
        !self.all.is_empty()
    }
}

/// Client of the optional popularity RPC backend.
pub struct PopularityClient {
    transport: Arc<dyn Transport>,
    rpc_url: String,
    api_key: String,
}

impl PopularityClient {
    pub fn new(transport: Arc<dyn Transport>, rpc_url: &str, api_key: &str) -> Self {
        Self {
            transport,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn call(
        &self,
        function: &str,
        params: &serde_json::Value,
    ) -> Result<crate::fetch::Response, LoadError> {
        let url = format!("{}/rest/v1/rpc/{}", self.rpc_url, function);
        let bearer = format!("Bearer {}", self.api_key);
        let headers = [
            ("apikey", self.api_key.as_str()),
            ("Authorization", bearer.as_str()),
        ];
        let response = self
            .transport
            .post_json(&url, &headers, params)
            .await
            .map_err(|source| LoadError::Transport {
                url: url.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(LoadError::Status {
                url,
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn increment(&self, function: &str, item: &WallpaperItem, series: &str) {
        let image_id = if item.filename.is_empty() {
            &item.id
        } else {
            &item.filename
        };
        let category = (!item.category.is_empty()).then_some(item.category.as_str());
        let params = json!({
            "img_id": image_id,
            "series_name": series,
            "cat": category,
        });
        if let Err(e) = self.call(function, &params).await {
            warn!(function, image_id = image_id.as_str(), error = %e, "failed to record stat");
        }
    }

    /// Count a preview. Failures are logged and swallowed.
    pub async fn record_view(&self, item: &WallpaperItem, series: &str) {
        self.increment("increment_view", item, series).await;
    }

    /// Count a download. Failures are logged and swallowed.
    pub async fn record_download(&self, item: &WallpaperItem, series: &str) {
        self.increment("increment_download", item, series).await;
    }

    /// Most popular images of a series in a window, best first.
    pub async fn fetch_ranked(
        &self,
        series: &str,
        window: Window,
        limit: usize,
    ) -> Result<Vec<PopularityRecord>, LoadError> {
        let mut params = json!({
            "series_filter": series,
            "limit_count": limit,
        });
        if let Some(days) = window.days() {
            params["days"] = json!(days);
        }
        let response = self.call("get_hot_stats", &params).await?;
        let raw: Vec<RawRecord> = response.json("get_hot_stats")?;
        Ok(raw.into_iter().map(PopularityRecord::from).collect())
    }
}

#[derive(Debug, Default)]
struct PopularityState {
    snapshot: PopularitySnapshot,
    fetched_at: Option<Instant>,
}

/// Session cache of the three rankings for the current series.
pub struct PopularityStore {
    client: Option<Arc<PopularityClient>>,
    stats: Option<Arc<StatsService>>,
    ttl: Duration,
    ranked_limit: usize,
    state: RwLock<PopularityState>,
}

impl PopularityStore {
    pub fn new(
        client: Option<Arc<PopularityClient>>,
        stats: Option<Arc<StatsService>>,
        ttl: Duration,
        ranked_limit: usize,
    ) -> Self {
        Self {
            client,
            stats,
            ttl,
            ranked_limit,
            state: RwLock::new(PopularityState::default()),
        }
    }

    /// A store with no sources; every lookup is zero.
    pub fn disabled() -> Self {
        Self::new(None, None, DEFAULT_TTL, DEFAULT_RANKED_LIMIT)
    }

    pub fn snapshot(&self) -> PopularitySnapshot {
        read(&self.state).snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        read(&self.state).snapshot.loading
    }

    fn is_fresh(&self, series: &str) -> bool {
        let state = read(&self.state);
        state.snapshot.series == series
            && state.snapshot.has_data()
            && state
                .fetched_at
                .map(|at| at.elapsed() < self.ttl)
                .unwrap_or(false)
    }

    /// Load rankings for a series. Old data is dropped immediately so a
    /// series switch never shows the previous series' numbers.
    pub async fn fetch(&self, series: &str, force: bool) {
        if !force && self.is_fresh(series) {
            debug!(series, "popularity cache hit");
            return;
        }

        {
            let mut state = write(&self.state);
            let revision = state.snapshot.revision + 1;
            state.snapshot = PopularitySnapshot {
                series: series.to_string(),
                loading: self.client.is_some() || self.stats.is_some(),
                revision,
                ..PopularitySnapshot::default()
            };
            state.fetched_at = None;
        }

        let (all, weekly, monthly) = match (&self.client, &self.stats) {
            (Some(client), _) => {
                let limit = self.ranked_limit;
                let (all, weekly, monthly) = tokio::join!(
                    client.fetch_ranked(series, Window::All, limit),
                    client.fetch_ranked(series, Window::Weekly, limit),
                    client.fetch_ranked(series, Window::Monthly, limit),
                );
                match (all, weekly, monthly) {
                    (Ok(all), Ok(weekly), Ok(monthly)) => (all, weekly, monthly),
                    (all, weekly, monthly) => {
                        let e = [all.err(), weekly.err(), monthly.err()]
                            .into_iter()
                            .flatten()
                            .next();
                        if let Some(e) = e {
                            warn!(series, error = %e, "failed to load popularity");
                        }
                        (Vec::new(), Vec::new(), Vec::new())
                    }
                }
            }
            (None, Some(stats)) => {
                let snapshot = stats.load_static_stats(series, force).await;
                (records_from_stats(&snapshot), Vec::new(), Vec::new())
            }
            (None, None) => (Vec::new(), Vec::new(), Vec::new()),
        };

        let mut state = write(&self.state);
        if state.snapshot.series != series {
            return;
        }
        let revision = state.snapshot.revision + 1;
        state.snapshot = PopularitySnapshot {
            series: series.to_string(),
            loading: false,
            all: Arc::new(rank_map(&all)),
            weekly: Arc::new(rank_map(&weekly)),
            monthly: Arc::new(rank_map(&monthly)),
            revision,
        };
        state.fetched_at = Some(Instant::now());
    }

    pub fn rank(&self, filename: &str) -> usize {
        self.entry(filename, Window::All).rank
    }

    pub fn download_count(&self, filename: &str) -> u64 {
        self.entry(filename, Window::All).downloads
    }

    pub fn view_count(&self, filename: &str) -> u64 {
        self.entry(filename, Window::All).views
    }

    /// Score in a window, without the all-time fallback used for sorting.
    pub fn popularity_score(&self, filename: &str, window: Window) -> u64 {
        let state = read(&self.state);
        let map = match window {
            Window::All => &state.snapshot.all,
            Window::Weekly => &state.snapshot.weekly,
            Window::Monthly => &state.snapshot.monthly,
        };
        map.get(filename).map(|e| e.score).unwrap_or(0)
    }

    fn entry(&self, filename: &str, window: Window) -> PopularityEntry {
        read(&self.state)
            .snapshot
            .map_for(window)
            .get(filename)
            .copied()
            .unwrap_or_default()
    }

    pub fn clear_data(&self) {
        let mut state = write(&self.state);
        let revision = state.snapshot.revision + 1;
        state.snapshot = PopularitySnapshot {
            revision,
            ..PopularitySnapshot::default()
        };
        state.fetched_at = None;
    }
}

/// Rank a static stats snapshot by score, best first. Equal scores order by
/// filename so the ranking is deterministic.
pub fn records_from_stats(stats: &HashMap<String, ViewStats>) -> Vec<PopularityRecord> {
    let mut records: Vec<PopularityRecord> = stats
        .iter()
        .map(|(id, s)| PopularityRecord::new(id.clone(), s.views, s.downloads))
        .collect();
    records.sort_by(|a, b| {
        b.popularity_score
            .cmp(&a.popularity_score)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeTransport;

    const RPC: &str = "https://rpc.test/rest/v1/rpc";

    fn client(transport: Arc<FakeTransport>) -> Arc<PopularityClient> {
        Arc::new(PopularityClient::new(transport, "https://rpc.test/", "anon"))
    }

    fn item(filename: &str) -> WallpaperItem {
        serde_json::from_value(json!({
            "id": "x-1",
            "filename": filename,
            "category": "风景",
            "createdAt": "2024-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn test_score_is_views_plus_double_downloads() {
        let record = PopularityRecord::new("a.jpg", 10, 4);
        assert_eq!(record.popularity_score, 18);
    }

    #[test]
    fn test_rank_map_keeps_first_occurrence() {
        let records = vec![
            PopularityRecord::new("a.jpg", 9, 0),
            PopularityRecord::new("b.jpg", 5, 0),
            PopularityRecord::new("a.jpg", 1, 0),
        ];
        let map = rank_map(&records);
        assert_eq!(map["a.jpg"].rank, 1);
        assert_eq!(map["a.jpg"].views, 9);
        assert_eq!(map["b.jpg"].rank, 2);
    }

    #[tokio::test]
    async fn test_record_view_posts_rpc() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(&format!("{}/increment_view", RPC), 204, "");
        let client = client(transport.clone());

        client.record_view(&item("风景--lake.jpg"), "desktop").await;

        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, format!("{}/increment_view", RPC));
        assert_eq!(posts[0].1["img_id"], "风景--lake.jpg");
        assert_eq!(posts[0].1["series_name"], "desktop");
        assert_eq!(posts[0].1["cat"], "风景");
    }

    #[tokio::test]
    async fn test_record_download_failure_is_swallowed() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail(&format!("{}/increment_download", RPC), "offline");
        client(transport).record_download(&item("a.jpg"), "mobile").await;
    }

    #[tokio::test]
    async fn test_fetch_loads_three_windows() {
        let transport = Arc::new(FakeTransport::new());
        // The fake routes by URL only, so every window sees the same list.
        transport.respond(
            &format!("{}/get_hot_stats", RPC),
            200,
            json!([
                {"filename": "a.jpg", "view_count": 3, "download_count": 1, "popularity_score": 5},
                {"image_id": "b.jpg", "total_views": 1, "total_downloads": 0},
            ])
            .to_string(),
        );
        let store = PopularityStore::new(Some(client(transport.clone())), None, DEFAULT_TTL, 100);

        store.fetch("desktop", false).await;
        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.all.len(), 2);
        assert_eq!(store.rank("b.jpg"), 2);
        assert_eq!(store.view_count("a.jpg"), 3);
        assert_eq!(store.download_count("a.jpg"), 1);
        assert_eq!(store.popularity_score("b.jpg", Window::Weekly), 1);

        let bodies: Vec<_> = transport.posts().into_iter().map(|(_, body)| body).collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().any(|b| b["days"] == 7));
        assert!(bodies.iter().any(|b| b["days"] == 30));

        // Fresh data is not refetched.
        store.fetch("desktop", false).await;
        assert_eq!(transport.posts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_refreshes_after_ttl() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            &format!("{}/get_hot_stats", RPC),
            200,
            json!([{"filename": "a.jpg", "view_count": 1}]).to_string(),
        );
        let store = PopularityStore::new(Some(client(transport.clone())), None, DEFAULT_TTL, 100);

        store.fetch("desktop", false).await;
        tokio::time::advance(DEFAULT_TTL + Duration::from_secs(1)).await;
        store.fetch("desktop", false).await;
        assert_eq!(transport.posts().len(), 6);
    }

    #[tokio::test]
    async fn test_backend_failure_yields_empty_maps() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(&format!("{}/get_hot_stats", RPC), 500, "");
        let store = PopularityStore::new(Some(client(transport)), None, DEFAULT_TTL, 100);

        store.fetch("desktop", false).await;
        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(!snapshot.has_data());
        assert_eq!(store.rank("a.jpg"), 0);
    }

    #[tokio::test]
    async fn test_disabled_store_is_zero() {
        let store = PopularityStore::disabled();
        store.fetch("desktop", false).await;
        assert!(!store.is_loading());
        assert_eq!(store.popularity_score("a.jpg", Window::All), 0);

        store.clear_data();
        assert_eq!(store.snapshot().series, "");
    }

    #[test]
    fn test_records_from_stats_ranks_by_score() {
        let mut stats = HashMap::new();
        stats.insert("a.jpg".to_string(), ViewStats { views: 1, downloads: 0 });
        stats.insert("b.jpg".to_string(), ViewStats { views: 0, downloads: 3 });
        let records = records_from_stats(&stats);
        assert_eq!(records[0].filename, "b.jpg");
        assert_eq!(records[0].popularity_score, 6);
    }
}
