use super::model::{DailyInfo, DailyRecord, Resolution, WallpaperItem};
use crate::utils::{file_extension, IMAGE_FORMATS};
use chrono::{NaiveDate, TimeZone, Utc};

const BING_CDN_BASE: &str = "https://cn.bing.com";

/// Resolves catalog-relative image paths into CDN URLs.
///
/// Each item may pin its own cache tag (`cdnTag`) so a single image can be
/// revalidated without busting the whole CDN cache; items without one use
/// the series-wide default tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnUrls {
    base: String,
    default_tag: String,
}

impl CdnUrls {
    pub fn new(base: impl Into<String>, default_tag: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            default_tag: default_tag.into(),
        }
    }

    pub fn image_url(&self, path: &str, tag: Option<&str>) -> String {
        let tag = tag.filter(|t| !t.is_empty()).unwrap_or(&self.default_tag);
        format!("{}@{}{}", self.base, tag, path)
    }

    /// Fill the derived URL fields of a freshly decoded item.
    pub fn apply(&self, mut item: WallpaperItem) -> WallpaperItem {
        let tag = item.cdn_tag.clone();
        let tag = tag.as_deref();

        if !item.path.is_empty() {
            item.url = self.image_url(&item.path, tag);
            item.download_url = item.url.clone();
        }
        if !item.thumbnail_path.is_empty() {
            item.thumbnail_url = self.image_url(&item.thumbnail_path, tag);
        }
        if let Some(preview) = item.preview_path.as_deref().filter(|p| !p.is_empty()) {
            item.preview_url = Some(self.image_url(preview, tag));
        }
        if item.format.is_empty() {
            let ext = file_extension(&item.filename);
            if IMAGE_FORMATS.contains(&ext.as_str()) {
                item.format = ext.to_uppercase();
            }
        }
        item
    }
}

fn bing_url(urlbase: &str, suffix: &str) -> String {
    if urlbase.is_empty() {
        return String::new();
    }
    format!("{}{}{}", BING_CDN_BASE, urlbase, suffix)
}

/// Turn a daily record into a gallery item. Returns `None` for records whose
/// date is not `YYYY-MM-DD`.
pub(crate) fn daily_item(record: DailyRecord) -> Option<WallpaperItem> {
    let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").ok()?;
    let created_at = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    let month = record.date.get(..7)?.to_string();
    let uhd = bing_url(&record.urlbase, "_UHD.jpg");

    Some(WallpaperItem {
        id: format!("bing-{}", record.date),
        filename: format!("bing-{}.jpg", record.date),
        category: month.clone(),
        subcategory: None,
        path: String::new(),
        thumbnail_path: String::new(),
        preview_path: None,
        // Bing does not publish sizes.
        size: 0,
        format: "JPG".to_string(),
        created_at,
        resolution: Some(Resolution {
            width: 3840,
            height: 2160,
            label: Some("4K UHD".to_string()),
            tier: Some("success".to_string()),
        }),
        tags: vec![record.title.clone(), month],
        cdn_tag: None,
        url: uhd.clone(),
        thumbnail_url: bing_url(&record.urlbase, "_400x240.jpg"),
        preview_url: Some(bing_url(&record.urlbase, "_1920x1080.jpg")),
        download_url: uhd,
        daily: Some(DailyInfo {
            date: record.date,
            title: record.title,
            copyright: record.copyright,
            urlbase: record.urlbase,
            hsh: record.hsh,
            quiz: record.quiz,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, tag: Option<&str>) -> WallpaperItem {
        let json = format!(
            r#"{{"id":"1","filename":"a.jpg","category":"c","path":"{}","thumbnailPath":"/thumb/a.webp","createdAt":"2024-01-01T00:00:00Z"}}"#,
            path
        );
        let mut item: WallpaperItem = serde_json::from_str(&json).unwrap();
        item.cdn_tag = tag.map(String::from);
        item
    }

    #[test]
    fn test_per_item_tag_wins() {
        let cdn = CdnUrls::new("https://cdn.example.com/gh/owner/repo", "v1.1.2");
        let tagged = cdn.apply(item("/wallpaper/a.jpg", Some("v1.0.9")));
        assert_eq!(tagged.url, "https://cdn.example.com/gh/owner/repo@v1.0.9/wallpaper/a.jpg");
        assert_eq!(tagged.download_url, tagged.url);
        assert_eq!(
            tagged.thumbnail_url,
            "https://cdn.example.com/gh/owner/repo@v1.0.9/thumb/a.webp"
        );
        assert!(tagged.preview_url.is_none());

        let untagged = cdn.apply(item("/wallpaper/a.jpg", None));
        assert_eq!(untagged.url, "https://cdn.example.com/gh/owner/repo@v1.1.2/wallpaper/a.jpg");
    }

    #[test]
    fn test_missing_format_comes_from_filename() {
        let cdn = CdnUrls::new("https://cdn.example.com", "v1");
        let applied = cdn.apply(item("/wallpaper/a.jpg", None));
        assert_eq!(applied.format, "JPG");

        let mut odd = item("/wallpaper/a.jpg", None);
        odd.filename = "a.tiff".into();
        assert_eq!(cdn.apply(odd).format, "");
    }

    #[test]
    fn test_daily_item() {
        let record = DailyRecord {
            date: "2025-01-07".into(),
            title: "Frozen lake".into(),
            urlbase: "/th?id=OHR.Lake".into(),
            copyright: "someone".into(),
            quiz: None,
            hsh: "abc".into(),
        };
        let item = daily_item(record).unwrap();
        assert_eq!(item.id, "bing-2025-01-07");
        assert_eq!(item.category, "2025-01");
        assert_eq!(item.url, "https://cn.bing.com/th?id=OHR.Lake_UHD.jpg");
        assert_eq!(item.created_at.to_rfc3339(), "2025-01-07T00:00:00+00:00");
    }

    #[test]
    fn test_daily_item_rejects_bad_date() {
        let record = DailyRecord {
            date: "yesterday".into(),
            title: String::new(),
            urlbase: String::new(),
            copyright: String::new(),
            quiz: None,
            hsh: String::new(),
        };
        assert!(daily_item(record).is_none());
    }
}
