use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::{SubcategoryEntry, WallpaperItem};

/// One entry of the category picker. `value: None` is the "all" entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOption {
    pub value: Option<String>,
    pub count: usize,
    pub subcategories: Vec<SubcategoryEntry>,
}

impl CategoryOption {
    pub fn label(&self) -> &str {
        self.value.as_deref().unwrap_or("All categories")
    }
}

/// Count names in first-seen order, then order by count descending. Equal
/// counts keep first-seen order.
fn ranked_counts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for name in names {
        match index.get(name) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(name, order.len());
                order.push((name, 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

/// Build the category picker: the "all" entry counting the whole
/// collection, then every category by item count with its subcategories.
pub fn category_options(items: &[WallpaperItem]) -> Vec<CategoryOption> {
    let categories = ranked_counts(
        items
            .iter()
            .map(|w| w.category.as_str())
            .filter(|c| !c.is_empty()),
    );

    let mut options = Vec::with_capacity(categories.len() + 1);
    options.push(CategoryOption {
        value: None,
        count: items.len(),
        subcategories: Vec::new(),
    });

    for (category, count) in categories {
        let subcategories = ranked_counts(
            items
                .iter()
                .filter(|w| w.category == category)
                .filter_map(|w| w.subcategory.as_deref())
                .filter(|s| !s.is_empty()),
        )
        .into_iter()
        .map(|(name, count)| SubcategoryEntry {
            name: name.to_string(),
            count,
        })
        .collect();

        options.push(CategoryOption {
            value: Some(category.to_string()),
            count,
            subcategories,
        });
    }
    options
}

/// Subcategories offered for the selected category; empty for "all" or a
/// category without subcategories.
pub fn subcategory_options<'a>(
    options: &'a [CategoryOption],
    category: Option<&str>,
) -> &'a [SubcategoryEntry] {
    let Some(category) = category else {
        return &[];
    };
    options
        .iter()
        .find(|o| o.value.as_deref() == Some(category))
        .map(|o| o.subcategories.as_slice())
        .unwrap_or(&[])
}
