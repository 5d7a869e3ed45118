//! Built-in wallpaper series and where their catalog files live.

use serde::{Deserialize, Serialize};

/// Static description of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub aspect_ratio: &'static str,
    /// Day-indexed series backed by per-year files instead of categories.
    pub daily: bool,
}

pub const SERIES: &[SeriesInfo] = &[
    SeriesInfo {
        id: "desktop",
        name: "Desktop",
        aspect_ratio: "16/10",
        daily: false,
    },
    SeriesInfo {
        id: "mobile",
        name: "Mobile",
        aspect_ratio: "9/16",
        daily: false,
    },
    SeriesInfo {
        id: "avatar",
        name: "Avatar",
        aspect_ratio: "1/1",
        daily: false,
    },
    SeriesInfo {
        id: "bing",
        name: "Daily Bing",
        aspect_ratio: "16/9",
        daily: true,
    },
];

pub const DEFAULT_SERIES: &str = "desktop";

pub fn lookup(id: &str) -> Option<&'static SeriesInfo> {
    SERIES.iter().find(|s| s.id == id)
}

pub fn is_daily(id: &str) -> bool {
    lookup(id).map(|s| s.daily).unwrap_or(false)
}

/// Builds catalog file locations below a data root.
///
/// The root is either an HTTP base (`https://host/data`) or, with a local
/// transport, an empty string so paths stay relative to the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUrls {
    base: String,
}

impl DataUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn join(&self, relative: &str) -> String {
        if self.base.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.base, relative)
        }
    }

    pub fn index(&self, series: &str) -> String {
        self.join(&format!("{}/index.json", series))
    }

    pub fn category(&self, series: &str, file: &str) -> String {
        self.join(&format!("{}/{}", series, file))
    }

    pub fn legacy(&self, series: &str) -> String {
        self.join(&format!("{}.json", series))
    }

    pub fn stats(&self, series: &str) -> String {
        self.join(&format!("stats/hot-{}.json", series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(lookup("desktop").is_some());
        assert!(is_daily("bing"));
        assert!(!is_daily("mobile"));
        assert!(lookup("tablet").is_none());
    }

    #[test]
    fn test_data_urls() {
        let urls = DataUrls::new("https://example.com/data/");
        assert_eq!(urls.index("desktop"), "https://example.com/data/desktop/index.json");
        assert_eq!(
            urls.category("mobile", "anime.json"),
            "https://example.com/data/mobile/anime.json"
        );
        assert_eq!(urls.legacy("avatar"), "https://example.com/data/avatar.json");
        assert_eq!(urls.stats("desktop"), "https://example.com/data/stats/hot-desktop.json");

        let local = DataUrls::new("");
        assert_eq!(local.index("desktop"), "desktop/index.json");
    }
}
