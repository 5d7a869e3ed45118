use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel dimensions recorded at catalog generation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub label: Option<String>,
    /// Display tier hint; older catalogs call this field `type`.
    #[serde(default, alias = "type")]
    pub tier: Option<String>,
}

impl Resolution {
    pub fn long_edge(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Extra metadata carried by items of a daily series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyInfo {
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub urlbase: String,
    #[serde(default)]
    pub hsh: String,
    #[serde(default)]
    pub quiz: Option<String>,
}

/// One image in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperItem {
    pub id: String,
    pub filename: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub thumbnail_path: String,
    #[serde(default)]
    pub preview_path: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub format: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cdn_tag: Option<String>,

    // Filled in when the item is loaded.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub download_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailyInfo>,
}

impl WallpaperItem {
    /// Long edge in pixels, 0 when the catalog has no resolution for it.
    pub fn long_edge(&self) -> u32 {
        self.resolution.as_ref().map(Resolution::long_edge).unwrap_or(0)
    }

    /// Filename without category prefix (`cat--name.jpg`) and extension.
    pub fn display_name(&self) -> &str {
        let name = self
            .filename
            .split_once("--")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.filename);
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryEntry {
    pub name: String,
    pub count: usize,
}

/// Index record pointing at one category file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub subcategories: Option<Vec<SubcategoryEntry>>,
}

/// Decoded series index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesIndex {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub category_count: usize,
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub env: Option<String>,
}

/// Outer shape of index, category and legacy files. The catalog payload sits
/// in `blob` (older builds: `payload`); plain `categories` / `wallpapers`
/// fields are only present in unencoded or transitional files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub category_count: Option<usize>,
    #[serde(default, alias = "payload")]
    pub blob: Option<String>,
    #[serde(default)]
    pub categories: Option<serde_json::Value>,
    #[serde(default)]
    pub wallpapers: Option<serde_json::Value>,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub env: Option<String>,
}

/// Recognized shapes of a decoded item list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemList {
    Bare(Vec<WallpaperItem>),
    Wrapped { wallpapers: Vec<WallpaperItem> },
}

impl ItemList {
    pub fn into_items(self) -> Vec<WallpaperItem> {
        match self {
            ItemList::Bare(items) => items,
            ItemList::Wrapped { wallpapers } => wallpapers,
        }
    }
}

/// Year table of a daily series index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyIndex {
    #[serde(default)]
    pub years: Vec<YearEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearEntry {
    pub year: i32,
    pub file: String,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct YearFile {
    #[serde(default)]
    pub items: Option<Vec<DailyRecord>>,
}

/// Raw record of a daily (Bing style) year file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DailyRecord {
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub urlbase: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub quiz: Option<String>,
    #[serde(default)]
    pub hsh: String,
}
