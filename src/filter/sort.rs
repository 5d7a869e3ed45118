use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::WallpaperItem;
use crate::popularity::{PopularityEntry, PopularitySnapshot, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    #[default]
    Newest,
    Oldest,
    Popular,
    Downloads,
    Views,
    WeeklyHot,
    MonthlyHot,
    Largest,
    Smallest,
    NameAsc,
    NameDesc,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort mode: {0}")]
pub struct UnknownSortMode(pub String);

impl SortMode {
    pub const ALL: [SortMode; 11] = [
        SortMode::Newest,
        SortMode::Oldest,
        SortMode::Popular,
        SortMode::Downloads,
        SortMode::Views,
        SortMode::WeeklyHot,
        SortMode::MonthlyHot,
        SortMode::Largest,
        SortMode::Smallest,
        SortMode::NameAsc,
        SortMode::NameDesc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
            SortMode::Popular => "popular",
            SortMode::Downloads => "downloads",
            SortMode::Views => "views",
            SortMode::WeeklyHot => "weekly-hot",
            SortMode::MonthlyHot => "monthly-hot",
            SortMode::Largest => "largest",
            SortMode::Smallest => "smallest",
            SortMode::NameAsc => "name-asc",
            SortMode::NameDesc => "name-desc",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SortMode::Newest => "Newest first",
            SortMode::Oldest => "Oldest first",
            SortMode::Popular => "Most popular",
            SortMode::Downloads => "Most downloaded",
            SortMode::Views => "Most viewed",
            SortMode::WeeklyHot => "Hot this week",
            SortMode::MonthlyHot => "Hot this month",
            SortMode::Largest => "Largest file",
            SortMode::Smallest => "Smallest file",
            SortMode::NameAsc => "Name A-Z",
            SortMode::NameDesc => "Name Z-A",
        }
    }

    /// Modes ranked by view/download statistics.
    pub fn needs_popularity(&self) -> bool {
        matches!(
            self,
            SortMode::Popular
                | SortMode::Downloads
                | SortMode::Views
                | SortMode::WeeklyHot
                | SortMode::MonthlyHot
        )
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = UnknownSortMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| UnknownSortMode(s.to_string()))
    }
}

fn newest(a: &WallpaperItem, b: &WallpaperItem) -> Ordering {
    b.created_at.cmp(&a.created_at)
}

fn sort_ranked(
    items: &mut [&WallpaperItem],
    map: &HashMap<String, PopularityEntry>,
    key: fn(&PopularityEntry) -> u64,
) {
    items.sort_by(|a, b| {
        let ka = map.get(&a.filename).map(key).unwrap_or(0);
        let kb = map.get(&b.filename).map(key).unwrap_or(0);
        kb.cmp(&ka).then_with(|| newest(a, b))
    });
}

/// Sort in place. Every mode is stable; ranked modes break ties newest first.
///
/// While popularity data is loading the ranked modes fall back to newest so
/// the grid does not reshuffle once the numbers arrive.
pub fn apply_sort(items: &mut [&WallpaperItem], mode: SortMode, popularity: &PopularitySnapshot) {
    let mode = if mode.needs_popularity() && popularity.loading {
        SortMode::Newest
    } else {
        mode
    };

    match mode {
        SortMode::Newest => items.sort_by(|a, b| newest(a, b)),
        SortMode::Oldest => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortMode::Popular => sort_ranked(items, popularity.map_for(Window::All), |e| e.score),
        SortMode::Downloads => {
            sort_ranked(items, popularity.map_for(Window::All), |e| e.downloads)
        }
        SortMode::Views => sort_ranked(items, popularity.map_for(Window::All), |e| e.views),
        SortMode::WeeklyHot => {
            sort_ranked(items, popularity.map_for(Window::Weekly), |e| e.score)
        }
        SortMode::MonthlyHot => {
            sort_ranked(items, popularity.map_for(Window::Monthly), |e| e.score)
        }
        SortMode::Largest => items.sort_by(|a, b| b.size.cmp(&a.size)),
        SortMode::Smallest => items.sort_by(|a, b| a.size.cmp(&b.size)),
        SortMode::NameAsc => items.sort_by(|a, b| a.filename.cmp(&b.filename)),
        SortMode::NameDesc => items.sort_by(|a, b| b.filename.cmp(&a.filename)),
    }
}
