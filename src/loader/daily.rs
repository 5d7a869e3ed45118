use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::Loader;
use crate::catalog::{WallpaperItem, YearEntry};
use crate::error::LoadError;
use crate::utils::{read, write};

/// Entry to open with: the current year, else the most recent one.
fn initial_year(years: &[YearEntry], current: i32) -> Option<&YearEntry> {
    years
        .iter()
        .find(|y| y.year == current)
        .or_else(|| years.iter().max_by_key(|y| y.year))
}

fn sort_newest_first(items: &mut [WallpaperItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl Loader {
    pub(super) async fn init_daily(
        &self,
        series: &str,
        force: bool,
        generation: u64,
    ) -> Result<(), LoadError> {
        let index = self.catalog.load_daily_index(series, force).await?;
        {
            let mut state = write(&self.state);
            if state.generation != generation {
                debug!(series, "series switched while its year index loaded");
                return Ok(());
            }
            state.expected_total = index.years.iter().map(|y| y.count).sum();
        }

        let Some(entry) = initial_year(&index.years, Utc::now().year()) else {
            let mut state = write(&self.state);
            if state.generation == generation {
                state.loading = false;
            }
            drop(state);
            self.publish();
            return Ok(());
        };

        let items = self.catalog.load_daily_year(series, entry).await?;
        {
            let mut state = write(&self.state);
            if state.generation != generation {
                return Ok(());
            }
            state.items = items;
            state.loaded_files.insert(entry.file.clone());
            state.loading = false;
        }
        self.publish();
        info!(series, year = entry.year, "daily series loaded");
        Ok(())
    }

    /// Merge another year into an open daily series. Years already merged
    /// are skipped.
    pub async fn load_year(&self, series: &str, year: i32) -> Result<(), LoadError> {
        let index = self.catalog.load_daily_index(series, false).await?;
        let Some(entry) = index.years.iter().find(|y| y.year == year) else {
            return Err(LoadError::Format(format!("no year {} in {}", year, series)));
        };

        let generation = {
            let state = read(&self.state);
            if state.series.as_deref() != Some(series) {
                return Ok(());
            }
            if state.loaded_files.contains(&entry.file) {
                debug!(series, year, "year already merged");
                return Ok(());
            }
            state.generation
        };

        write(&self.state).loading = true;
        self.publish();

        let result = self.catalog.load_daily_year(series, entry).await;
        {
            let mut state = write(&self.state);
            state.loading = false;
            if let Ok(items) = &result {
                if state.generation == generation && !state.loaded_files.contains(&entry.file) {
                    let mut merged: Vec<WallpaperItem> = state.items.iter().cloned().collect();
                    merged.extend(items.iter().cloned());
                    sort_newest_first(&mut merged);
                    state.items = Arc::new(merged);
                    state.loaded_files.insert(entry.file.clone());
                }
            }
        }
        self.publish();
        result.map(|_| ())
    }

    /// Years merged into the open daily series, newest first.
    pub fn loaded_years(&self) -> Vec<i32> {
        let state = read(&self.state);
        let mut years: Vec<i32> = state
            .loaded_files
            .iter()
            .filter_map(|file| file.strip_suffix(".json"))
            .filter_map(|stem| stem.parse().ok())
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years
    }
}
