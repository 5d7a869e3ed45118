//! Static view/download snapshots with a one hour local cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fetch::Transport;
use crate::popularity::{PopularityClient, Window};
use crate::series::DataUrls;

pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(60 * 60);
const CACHE_PREFIX: &str = "stats_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewStats {
    pub views: u64,
    pub downloads: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Counts {
    #[serde(default)]
    views: Option<u64>,
    #[serde(default)]
    total_views: Option<u64>,
    #[serde(default)]
    downloads: Option<u64>,
    #[serde(default)]
    total_downloads: Option<u64>,
}

impl Counts {
    fn into_stats(self) -> ViewStats {
        fn pick(primary: Option<u64>, fallback: Option<u64>) -> u64 {
            primary.filter(|v| *v > 0).or(fallback).unwrap_or(0)
        }
        ViewStats {
            views: pick(self.views, self.total_views),
            downloads: pick(self.downloads, self.total_downloads),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    image_id: String,
    #[serde(flatten)]
    counts: Counts,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Entry {
    Views(u64),
    Counts(Counts),
}

/// Published snapshot shapes, oldest generator output last.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Rows(Vec<Row>),
    Map(HashMap<String, Entry>),
}

impl Snapshot {
    fn into_map(self) -> HashMap<String, ViewStats> {
        match self {
            Snapshot::Rows(rows) => rows
                .into_iter()
                .map(|row| (row.image_id, row.counts.into_stats()))
                .collect(),
            Snapshot::Map(map) => map
                .into_iter()
                .map(|(id, entry)| {
                    let stats = match entry {
                        Entry::Views(views) => ViewStats {
                            views,
                            downloads: 0,
                        },
                        Entry::Counts(counts) => counts.into_stats(),
                    };
                    (id, stats)
                })
                .collect(),
        }
    }
}

/// Parse a stats snapshot body in any of its published shapes.
pub fn parse_snapshot(body: &str) -> Result<HashMap<String, ViewStats>, serde_json::Error> {
    serde_json::from_str::<Snapshot>(body).map(Snapshot::into_map)
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    saved_at: DateTime<Utc>,
    data: HashMap<String, ViewStats>,
}

pub struct StatsService {
    transport: Arc<dyn Transport>,
    data: DataUrls,
    cache_dir: Option<PathBuf>,
    ttl: Duration,
    backend: Option<Arc<PopularityClient>>,
    ranked_limit: usize,
}

impl StatsService {
    pub fn new(transport: Arc<dyn Transport>, data: DataUrls, cache_dir: Option<PathBuf>) -> Self {
        Self {
            transport,
            data,
            cache_dir,
            ttl: DEFAULT_STATS_TTL,
            backend: None,
            ranked_limit: crate::popularity::DEFAULT_RANKED_LIMIT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fall back to the RPC backend when no static snapshot is published.
    pub fn with_backend(mut self, backend: Arc<PopularityClient>, ranked_limit: usize) -> Self {
        self.backend = Some(backend);
        self.ranked_limit = ranked_limit;
        self
    }

    fn cache_path(&self, series: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}{}.json", CACHE_PREFIX, series)))
    }

    fn read_cache(&self, series: &str) -> Option<HashMap<String, ViewStats>> {
        let path = self.cache_path(series)?;
        let content = std::fs::read_to_string(&path).ok()?;
        let cache: CacheFile = match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "dropping unreadable stats cache");
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        let age = Utc::now()
            .signed_duration_since(cache.saved_at)
            .to_std()
            .unwrap_or_default();
        if age > self.ttl {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(cache.data)
    }

    fn write_cache(&self, series: &str, data: &HashMap<String, ViewStats>) {
        let Some(path) = self.cache_path(series) else {
            return;
        };
        let cache = CacheFile {
            saved_at: Utc::now(),
            data: data.clone(),
        };
        let result = path
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| {
                let content = serde_json::to_string(&cache)?;
                std::fs::write(&path, content)
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to write stats cache");
        }
    }

    /// Stats for a series keyed by image id. Never fails: a missing or
    /// broken snapshot yields an empty map.
    pub async fn load_static_stats(&self, series: &str, force: bool) -> HashMap<String, ViewStats> {
        if !force {
            if let Some(cached) = self.read_cache(series) {
                debug!(series, entries = cached.len(), "stats cache hit");
                return cached;
            }
        }

        let url = self.data.stats(series);
        let stats = match self.transport.get(&url).await {
            Ok(response) if response.is_success() => match parse_snapshot(&response.body) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(series, error = %e, "failed to parse stats snapshot");
                    return HashMap::new();
                }
            },
            Ok(response) if response.status == 404 => {
                debug!(series, url = %url, "no stats snapshot published");
                HashMap::new()
            }
            Ok(response) => {
                warn!(series, status = response.status, "failed to fetch stats snapshot");
                return HashMap::new();
            }
            Err(e) => {
                warn!(series, error = %e, "failed to fetch stats snapshot");
                return HashMap::new();
            }
        };

        let stats = if stats.is_empty() {
            self.load_backend_stats(series).await
        } else {
            stats
        };

        if !stats.is_empty() {
            self.write_cache(series, &stats);
            info!(series, entries = stats.len(), "stats snapshot loaded");
        }
        stats
    }

    async fn load_backend_stats(&self, series: &str) -> HashMap<String, ViewStats> {
        let Some(backend) = &self.backend else {
            return HashMap::new();
        };
        match backend
            .fetch_ranked(series, Window::All, self.ranked_limit)
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|r| {
                    (
                        r.filename,
                        ViewStats {
                            views: r.view_count,
                            downloads: r.download_count,
                        },
                    )
                })
                .collect(),
            Err(e) => {
                warn!(series, error = %e, "failed to load stats from backend");
                HashMap::new()
            }
        }
    }

    /// Remove cached snapshots for one series, or all of them.
    pub fn clear_cache(&self, series: Option<&str>) -> std::io::Result<usize> {
        let Some(dir) = &self.cache_dir else {
            return Ok(0);
        };
        match series {
            Some(series) => {
                let path = dir.join(format!("{}{}.json", CACHE_PREFIX, series));
                Ok(remove_if_exists(&path)? as usize)
            }
            None => {
                let entries = match std::fs::read_dir(dir) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
                    Err(e) => return Err(e),
                };
                let mut removed = 0;
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    if name.to_string_lossy().starts_with(CACHE_PREFIX) {
                        removed += remove_if_exists(&entry.path())? as usize;
                    }
                }
                Ok(removed)
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
