//! Catalog index and per-category caches.
//!
//! Index and category files are fetched lazily, decoded once and kept for the
//! session. Each cache slot is a once-cell, so concurrent requests for the
//! same file share one fetch, and a failed fetch leaves the slot empty for
//! the next caller to retry.

mod model;
mod urls;

pub use model::{
    CategoryEntry, DailyIndex, DailyInfo, Resolution, SeriesIndex, SubcategoryEntry,
    WallpaperItem, YearEntry,
};
pub use urls::CdnUrls;

use model::{Envelope, ItemList, YearFile};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::codec::{self, BlobError};
use crate::error::{ErrorKind, LoadError};
use crate::fetch::{fetch_with_retry, RetryPolicy, Transport};
use crate::series::{self, DataUrls};
use crate::utils::lock;

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Category-map key of the legacy single-file catalog.
const LEGACY_KEY: &str = "<legacy>";

/// Load progress of one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesPhase {
    Unloaded,
    IndexLoading,
    IndexLoaded,
    CategoryLoading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogOptions {
    pub retry: RetryPolicy,
    /// Blobs longer than this are decoded on the blocking pool.
    pub offload_threshold: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            offload_threshold: codec::OFFLOAD_THRESHOLD,
        }
    }
}

pub struct CatalogStore {
    transport: Arc<dyn Transport>,
    data: DataUrls,
    cdn: CdnUrls,
    options: CatalogOptions,
    indexes: Mutex<HashMap<String, Slot<SeriesIndex>>>,
    daily_indexes: Mutex<HashMap<String, Slot<DailyIndex>>>,
    /// series id -> category file -> items
    categories: Mutex<HashMap<String, HashMap<String, Slot<Vec<WallpaperItem>>>>>,
    phases: Mutex<HashMap<String, SeriesPhase>>,
    last_error: Mutex<Option<ErrorKind>>,
}

fn blob_error(context: &str, err: BlobError) -> LoadError {
    match err {
        BlobError::Codec(source) => LoadError::Decode {
            context: context.to_string(),
            source,
        },
        BlobError::Json(e) => LoadError::json(context, &e),
    }
}

impl CatalogStore {
    pub fn new(
        transport: Arc<dyn Transport>,
        data: DataUrls,
        cdn: CdnUrls,
        options: CatalogOptions,
    ) -> Self {
        Self {
            transport,
            data,
            cdn,
            options,
            indexes: Mutex::new(HashMap::new()),
            daily_indexes: Mutex::new(HashMap::new()),
            categories: Mutex::new(HashMap::new()),
            phases: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Kind of the most recent load failure, for differentiated UI messages.
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        *lock(&self.last_error)
    }

    pub fn phase(&self, series: &str) -> SeriesPhase {
        lock(&self.phases)
            .get(series)
            .copied()
            .unwrap_or(SeriesPhase::Unloaded)
    }

    fn set_phase(&self, series: &str, phase: SeriesPhase) {
        lock(&self.phases).insert(series.to_string(), phase);
    }

    fn fail(&self, series: &str, err: LoadError) -> LoadError {
        error!(series, kind = %err.kind(), error = %err, "catalog load failed");
        *lock(&self.last_error) = Some(err.kind());
        self.set_phase(series, SeriesPhase::Error);
        err
    }

    fn check_series(&self, series: &str) -> Result<(), LoadError> {
        if series::lookup(series).is_none() {
            return Err(self.fail(series, LoadError::UnknownSeries(series.to_string())));
        }
        Ok(())
    }

    /// Load the category index of a series, at most once per session unless
    /// `force` is set.
    pub async fn load_series_index(
        &self,
        series: &str,
        force: bool,
    ) -> Result<Arc<SeriesIndex>, LoadError> {
        self.check_series(series)?;

        let slot = {
            let mut indexes = lock(&self.indexes);
            if force {
                indexes.insert(series.to_string(), Slot::default());
            }
            indexes.entry(series.to_string()).or_default().clone()
        };

        if let Some(index) = slot.get() {
            debug!(series, "series index cache hit");
            return Ok(index.clone());
        }

        self.set_phase(series, SeriesPhase::IndexLoading);
        match slot.get_or_try_init(|| self.fetch_index(series)).await {
            Ok(index) => {
                if self.phase(series) == SeriesPhase::IndexLoading {
                    self.set_phase(series, SeriesPhase::IndexLoaded);
                }
                Ok(index.clone())
            }
            Err(e) => Err(self.fail(series, e)),
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
        let response = fetch_with_retry(&*self.transport, url, self.options.retry).await?;
        response.json::<Value>(url)
    }

    async fn fetch_index(&self, series: &str) -> Result<Arc<SeriesIndex>, LoadError> {
        let url = self.data.index(series);
        let raw = self.fetch_json(&url).await?;
        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| LoadError::Format(format!("index {}: {}", url, e)))?;

        let categories = match envelope.blob.as_deref() {
            Some(blob) => {
                match codec::decode_json_offloaded::<Value>(blob, self.options.offload_threshold)
                    .await
                {
                    Ok(decoded) => decoded,
                    Err(e) => match envelope.categories.clone() {
                        Some(plain) => {
                            warn!(series, error = %e, "index blob did not decode, using plain categories");
                            plain
                        }
                        None => return Err(blob_error("category index", e)),
                    },
                }
            }
            None => envelope.categories.clone().unwrap_or(Value::Null),
        };

        if !categories.is_array() {
            return Err(LoadError::Format(
                "index data is missing a categories array".to_string(),
            ));
        }
        let categories: Vec<CategoryEntry> = serde_json::from_value(categories)
            .map_err(|e| LoadError::Format(format!("index categories: {}", e)))?;

        let total = envelope
            .total
            .unwrap_or_else(|| categories.iter().map(|c| c.count).sum());

        info!(series, categories = categories.len(), total, "series index loaded");

        Ok(Arc::new(SeriesIndex {
            generated_at: envelope.generated_at,
            series: envelope.series,
            series_name: envelope.series_name,
            total,
            category_count: envelope.category_count.unwrap_or(categories.len()),
            categories,
            schema: envelope.schema,
            env: envelope.env,
        }))
    }

    fn category_slot(&self, series: &str, file: &str) -> Slot<Vec<WallpaperItem>> {
        lock(&self.categories)
            .entry(series.to_string())
            .or_default()
            .entry(file.to_string())
            .or_default()
            .clone()
    }

    pub fn is_category_loaded(&self, series: &str, file: &str) -> bool {
        lock(&self.categories)
            .get(series)
            .and_then(|files| files.get(file))
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Load one category file of a series, cached by `(series, file)`.
    pub async fn load_category(
        &self,
        series: &str,
        file: &str,
    ) -> Result<Arc<Vec<WallpaperItem>>, LoadError> {
        self.check_series(series)?;

        let slot = self.category_slot(series, file);
        if let Some(items) = slot.get() {
            debug!(series, file, "category cache hit");
            return Ok(items.clone());
        }

        self.set_phase(series, SeriesPhase::CategoryLoading);
        let url = self.data.category(series, file);
        let result = slot
            .get_or_try_init(|| async {
                let items = self.fetch_items(&url, file).await?;
                Ok::<_, LoadError>(Arc::new(items))
            })
            .await;

        match result {
            Ok(items) => {
                self.update_ready_phase(series);
                Ok(items.clone())
            }
            Err(e) => Err(self.fail(series, e)),
        }
    }

    fn update_ready_phase(&self, series: &str) {
        let index = lock(&self.indexes)
            .get(series)
            .and_then(|slot| slot.get().cloned());
        let Some(index) = index else {
            return;
        };
        let all_loaded = index
            .categories
            .iter()
            .all(|c| self.is_category_loaded(series, &c.file));
        self.set_phase(
            series,
            if all_loaded {
                SeriesPhase::Ready
            } else {
                SeriesPhase::IndexLoaded
            },
        );
    }

    async fn fetch_items(&self, url: &str, context: &str) -> Result<Vec<WallpaperItem>, LoadError> {
        let raw = self.fetch_json(url).await?;
        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| LoadError::Format(format!("category {}: {}", context, e)))?;

        let list = match envelope.blob.as_deref() {
            Some(blob) => {
                match codec::decode_json_offloaded::<Value>(blob, self.options.offload_threshold)
                    .await
                {
                    Ok(decoded) => decoded,
                    Err(e) => match envelope.wallpapers.clone() {
                        Some(plain) if plain.is_array() => {
                            warn!(file = context, error = %e, "category blob did not decode, using plain list");
                            plain
                        }
                        _ => return Err(blob_error(&format!("category {}", context), e)),
                    },
                }
            }
            None => envelope
                .wallpapers
                .clone()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        };

        let items = serde_json::from_value::<ItemList>(list)
            .map_err(|_| LoadError::Format(format!("invalid category data format: {}", context)))?
            .into_items();

        Ok(items.into_iter().map(|item| self.cdn.apply(item)).collect())
    }

    /// Load the pre-category single-file catalog of a series.
    pub async fn load_legacy_series(
        &self,
        series: &str,
    ) -> Result<Arc<Vec<WallpaperItem>>, LoadError> {
        self.check_series(series)?;

        let slot = self.category_slot(series, LEGACY_KEY);
        let url = self.data.legacy(series);
        let result = slot
            .get_or_try_init(|| async {
                let items = self.fetch_items(&url, &format!("{}.json", series)).await?;
                Ok::<_, LoadError>(Arc::new(items))
            })
            .await;

        result.cloned().map_err(|e| self.fail(series, e))
    }

    /// Load the year table of a daily series.
    pub async fn load_daily_index(
        &self,
        series: &str,
        force: bool,
    ) -> Result<Arc<DailyIndex>, LoadError> {
        self.check_series(series)?;

        let slot = {
            let mut indexes = lock(&self.daily_indexes);
            if force {
                indexes.insert(series.to_string(), Slot::default());
            }
            indexes.entry(series.to_string()).or_default().clone()
        };

        let url = self.data.index(series);
        let result = slot
            .get_or_try_init(|| async {
                let raw = self.fetch_json(&url).await?;
                let index: DailyIndex = serde_json::from_value(raw)
                    .map_err(|e| LoadError::Format(format!("daily index: {}", e)))?;
                Ok::<_, LoadError>(Arc::new(index))
            })
            .await;

        result.cloned().map_err(|e| self.fail(series, e))
    }

    /// Load one year file of a daily series, newest first.
    pub async fn load_daily_year(
        &self,
        series: &str,
        year: &YearEntry,
    ) -> Result<Arc<Vec<WallpaperItem>>, LoadError> {
        self.check_series(series)?;

        let slot = self.category_slot(series, &year.file);
        let url = self.data.category(series, &year.file);
        let result = slot
            .get_or_try_init(|| async {
                let raw = self.fetch_json(&url).await?;
                let file: YearFile = serde_json::from_value(raw)
                    .map_err(|e| LoadError::Format(format!("year {}: {}", year.year, e)))?;
                let mut items: Vec<WallpaperItem> = file
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|record| {
                        let date = record.date.clone();
                        let item = urls::daily_item(record);
                        if item.is_none() {
                            warn!(series, date = %date, "skipping daily record with bad date");
                        }
                        item
                    })
                    .collect();
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok::<_, LoadError>(Arc::new(items))
            })
            .await;

        result.cloned().map_err(|e| self.fail(series, e))
    }

    /// Drop cached catalog data for one series, or for all of them.
    pub fn clear_cache(&self, series: Option<&str>) {
        match series {
            Some(series) => {
                lock(&self.indexes).remove(series);
                lock(&self.daily_indexes).remove(series);
                lock(&self.categories).remove(series);
                lock(&self.phases).remove(series);
            }
            None => {
                lock(&self.indexes).clear();
                lock(&self.daily_indexes).clear();
                lock(&self.categories).clear();
                lock(&self.phases).clear();
            }
        }
        *lock(&self.last_error) = None;
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::codec::encode;
    use crate::fetch::testing::FakeTransport;
    use serde_json::json;

    const INDEX_URL: &str = "https://site.test/data/desktop/index.json";

    #[tokio::test]
    async fn test_index_loaded_once() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "desktop", &[2, 3]);
        let catalog = store(transport.clone());

        let first = catalog.load_series_index("desktop", false).await.unwrap();
        let second = catalog.load_series_index("desktop", false).await.unwrap();

        assert_eq!(transport.calls(INDEX_URL), 1);
        assert_eq!(first, second);
        assert_eq!(first.total, 5);
        assert_eq!(first.categories.len(), 2);
        assert_eq!(catalog.phase("desktop"), SeriesPhase::IndexLoaded);
    }

    #[tokio::test]
    async fn test_force_refresh_refetches_index() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "desktop", &[1]);
        let catalog = store(transport.clone());

        catalog.load_series_index("desktop", false).await.unwrap();
        catalog.load_series_index("desktop", true).await.unwrap();
        assert_eq!(transport.calls(INDEX_URL), 2);
    }

    #[tokio::test]
    async fn test_concurrent_index_loads_share_one_fetch() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "desktop", &[1]);
        transport.delay(INDEX_URL, std::time::Duration::from_millis(20));
        let catalog = store(transport.clone());

        let (a, b) = tokio::join!(
            catalog.load_series_index("desktop", false),
            catalog.load_series_index("desktop", false)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls(INDEX_URL), 1);
    }

    #[tokio::test]
    async fn test_index_without_categories_is_format_error() {
        let transport = Arc::new(FakeTransport::new());
        let body = json!({ "total": 1, "blob": encode(r#"{"foo": 1}"#) });
        transport.respond(INDEX_URL, 200, body.to_string());
        let catalog = store(transport);

        let err = catalog.load_series_index("desktop", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(catalog.last_error_kind(), Some(ErrorKind::Format));
        assert_eq!(catalog.phase("desktop"), SeriesPhase::Error);
    }

    #[tokio::test]
    async fn test_index_falls_back_to_plain_categories() {
        let transport = Arc::new(FakeTransport::new());
        let body = json!({
            "total": 4,
            "blob": "not-an-encoded-blob",
            "categories": [{"name": "风景", "file": "landscape.json", "count": 4, "thumbnail": ""}],
        });
        transport.respond(INDEX_URL, 200, body.to_string());
        let catalog = store(transport);

        let index = catalog.load_series_index("desktop", false).await.unwrap();
        assert_eq!(index.categories[0].file, "landscape.json");
    }

    #[tokio::test]
    async fn test_undecodable_index_is_parse_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(INDEX_URL, 200, json!({ "blob": "garbage" }).to_string());
        let catalog = store(transport);

        let err = catalog.load_series_index("desktop", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(INDEX_URL, 200, "{ nope");
        let catalog = store(transport);

        let err = catalog.load_series_index("desktop", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_missing_index_is_network_error() {
        let transport = Arc::new(FakeTransport::new());
        let catalog = store(transport);

        let err = catalog.load_series_index("desktop", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_unknown_series_is_format_error() {
        let catalog = store(Arc::new(FakeTransport::new()));
        let err = catalog.load_series_index("tablet", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[tokio::test]
    async fn test_category_urls_and_cache() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "desktop", &[2]);
        let catalog = store(transport.clone());

        let items = catalog.load_category("desktop", "cat0.json").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].url,
            format!("{}@v1.0.0/wallpaper/desktop/cat0/img0.jpg", CDN_BASE)
        );

        catalog.load_category("desktop", "cat0.json").await.unwrap();
        assert_eq!(
            transport.calls("https://site.test/data/desktop/cat0.json"),
            1
        );
        assert!(catalog.is_category_loaded("desktop", "cat0.json"));
    }

    #[tokio::test]
    async fn test_category_accepts_wrapped_list() {
        let transport = Arc::new(FakeTransport::new());
        let wrapped = json!({ "wallpapers": [item_json("mobile", "c", 1)] });
        let body = json!({ "blob": encode(&wrapped.to_string()) });
        transport.respond("https://site.test/data/mobile/c.json", 200, body.to_string());
        let catalog = store(transport);

        let items = catalog.load_category("mobile", "c.json").await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_category_with_wrong_shape_is_format_error() {
        let transport = Arc::new(FakeTransport::new());
        let body = json!({ "blob": encode(r#"{"foo": 1}"#) });
        transport.respond("https://site.test/data/mobile/c.json", 200, body.to_string());
        let catalog = store(transport);

        let err = catalog.load_category("mobile", "c.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[tokio::test]
    async fn test_phase_reaches_ready() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "avatar", &[1, 1]);
        let catalog = store(transport);

        assert_eq!(catalog.phase("avatar"), SeriesPhase::Unloaded);
        catalog.load_series_index("avatar", false).await.unwrap();
        catalog.load_category("avatar", "cat0.json").await.unwrap();
        assert_eq!(catalog.phase("avatar"), SeriesPhase::IndexLoaded);
        catalog.load_category("avatar", "cat1.json").await.unwrap();
        assert_eq!(catalog.phase("avatar"), SeriesPhase::Ready);
    }

    #[tokio::test]
    async fn test_legacy_single_file() {
        let transport = Arc::new(FakeTransport::new());
        let items = Value::Array(vec![item_json("desktop", "a", 1), item_json("desktop", "b", 2)]);
        let body = json!({ "series": "desktop", "total": 2, "blob": encode(&items.to_string()) });
        transport.respond("https://site.test/data/desktop.json", 200, body.to_string());
        let catalog = store(transport);

        let items = catalog.load_legacy_series("desktop").await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let transport = Arc::new(FakeTransport::new());
        publish_series(&transport, "desktop", &[1]);
        let catalog = store(transport.clone());

        catalog.load_series_index("desktop", false).await.unwrap();
        catalog.clear_cache(Some("desktop"));
        catalog.load_series_index("desktop", false).await.unwrap();
        assert_eq!(transport.calls(INDEX_URL), 2);
    }
}
