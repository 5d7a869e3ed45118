//! Filtering and sorting of the visible collection.
//!
//! Five predicates are AND-composed in a fixed order: text search, format,
//! resolution tier, category, subcategory. Sorting runs on the filtered
//! subset.

mod options;
mod resolution;
mod sort;
mod state;
mod store;

pub use options::{category_options, subcategory_options, CategoryOption};
pub use resolution::{ResolutionTier, UnknownTier};
pub use sort::{apply_sort, SortMode, UnknownSortMode};
pub use state::{FilterState, SearchDebounce, SeriesFilter, SEARCH_DEBOUNCE};
pub use store::FilterStore;

use crate::catalog::WallpaperItem;
use crate::popularity::PopularitySnapshot;

/// Case-insensitive substring match over filename, category, subcategory
/// and tags. `query` must already be lowercase.
fn matches_query(item: &WallpaperItem, query: &str) -> bool {
    item.filename.to_lowercase().contains(query)
        || item.category.to_lowercase().contains(query)
        || item
            .subcategory
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(query))
        || item.tags.iter().any(|t| t.to_lowercase().contains(query))
}

/// Items passing every active filter, in collection order.
///
/// `skip_category` ignores the primary category filter, for views whose data
/// is already restricted to one category.
pub fn apply_filters<'a>(
    items: &'a [WallpaperItem],
    state: &FilterState,
    skip_category: bool,
) -> Vec<&'a WallpaperItem> {
    let query = state.search_query.trim().to_lowercase();
    let format = state.format.as_deref().map(str::to_lowercase);

    items
        .iter()
        .filter(|w| query.is_empty() || matches_query(w, &query))
        .filter(|w| {
            format
                .as_deref()
                .map_or(true, |f| w.format.to_lowercase() == f)
        })
        .filter(|w| {
            state
                .resolution
                .map_or(true, |tier| ResolutionTier::for_long_edge(w.long_edge()) == tier)
        })
        .filter(|w| {
            skip_category
                || state
                    .category
                    .as_deref()
                    .map_or(true, |c| w.category == c)
        })
        .filter(|w| {
            state
                .subcategory
                .as_deref()
                .map_or(true, |s| w.subcategory.as_deref() == Some(s))
        })
        .collect()
}

/// Filter then sort into an owned list.
pub fn filtered_and_sorted(
    items: &[WallpaperItem],
    state: &FilterState,
    popularity: &PopularitySnapshot,
    skip_category: bool,
) -> Vec<WallpaperItem> {
    let mut visible = apply_filters(items, state, skip_category);
    apply_sort(&mut visible, state.sort_by, popularity);
    visible.into_iter().cloned().collect()
}


#[cfg(test)]
mod tests {
    use super::testing::{item, with_resolution};
    use super::*;

    fn ids(items: &[&WallpaperItem]) -> Vec<String> {
        items.iter().map(|w| w.id.clone()).collect()
    }

    #[test]
    fn test_search_matches_tags_and_subcategory() {
        let mut tagged = item("sunset", "风景", None, 1, "2024-01-01");
        tagged.tags = vec!["Ocean".into()];
        let sub = item("x", "游戏", Some("原神"), 1, "2024-01-01");
        let other = item("y", "游戏", None, 1, "2024-01-01");
        let items = vec![tagged, sub, other];

        let state = FilterState {
            search_query: "OCEAN".into(),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&items, &state, false)), ["sunset"]);

        let state = FilterState {
            search_query: "原神".into(),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&items, &state, false)), ["x"]);
    }

    #[test]
    fn test_resolution_filter_is_exact_tier() {
        let items = vec![
            with_resolution(item("uhd", "c", None, 1, "2024-01-01"), 3840, 2160),
            with_resolution(item("wide", "c", None, 1, "2024-01-01"), 4096, 2160),
            with_resolution(item("portrait", "c", None, 1, "2024-01-01"), 2160, 3840),
            item("unknown", "c", None, 1, "2024-01-01"),
        ];

        let state = FilterState {
            resolution: Some(ResolutionTier::K4),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&items, &state, false)), ["uhd", "portrait"]);

        let state = FilterState {
            resolution: Some(ResolutionTier::Sd),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&items, &state, false)), ["unknown"]);
    }

    #[test]
    fn test_format_is_case_insensitive() {
        let mut png = item("p", "c", None, 1, "2024-01-01");
        png.format = "PNG".into();
        let items = vec![png, item("j", "c", None, 1, "2024-01-01")];
        let state = FilterState {
            format: Some("png".into()),
            ..FilterState::default()
        };
        assert_eq!(ids(&apply_filters(&items, &state, false)), ["p"]);
    }

    #[test]
    fn test_skip_category() {
        let items = vec![
            item("a", "动漫", None, 1, "2024-01-01"),
            item("b", "风景", None, 1, "2024-01-01"),
        ];
        let state = FilterState {
            category: Some("动漫".into()),
            ..FilterState::default()
        };
        assert_eq!(apply_filters(&items, &state, false).len(), 1);
        assert_eq!(apply_filters(&items, &state, true).len(), 2);
    }

    #[test]
    fn test_filtered_and_sorted() {
        let items = vec![
            item("old", "c", None, 1, "2023-01-01"),
            item("new", "c", None, 1, "2024-01-01"),
            item("skip", "d", None, 1, "2025-01-01"),
        ];
        let state = FilterState {
            category: Some("c".into()),
            ..FilterState::default()
        };
        let result = filtered_and_sorted(&items, &state, &PopularitySnapshot::default(), false);
        let ids: Vec<&str> = result.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
    }
}
