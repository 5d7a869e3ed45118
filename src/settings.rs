//! Durable per-user preferences.
//!
//! A flat JSON object of string keys, rewritten as a whole on every change.
//! Without a path the store only lives in memory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::utils::lock;

pub const KEY_SORT: &str = "sort";
pub const KEY_CATEGORY: &str = "category";
pub const KEY_VIEW_MODE: &str = "view_mode";
pub const KEY_THEME: &str = "theme";
pub const KEY_CURRENT_SERIES: &str = "current_series";
pub const KEY_SERIES_FILTERS: &str = "series_filters";

#[derive(Debug, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: Mutex<BTreeMap<String, Value>>,
}

impl SettingsStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the settings file. A missing file starts empty; an unreadable
    /// one is reported and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = lock(&self.values).get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed setting");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize setting {}", key))?;
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        self.save(&values)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }

    fn save(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }
}
