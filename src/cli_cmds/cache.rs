use anyhow::{bail, Context, Result};

use wallgallery::app::Gallery;
use wallgallery::series::lookup;

pub fn cmd_cache_clear(gallery: &Gallery, series: Option<&str>) -> Result<()> {
    if let Some(id) = series {
        if lookup(id).is_none() {
            bail!("Unknown series: {}", id);
        }
    }

    let removed = gallery
        .stats()
        .clear_cache(series)
        .context("Failed to clear stats cache")?;
    gallery.clear_data();

    match series {
        Some(id) => println!("Removed {} cached stats file(s) for {}", removed, id),
        None => println!("Removed {} cached stats file(s)", removed),
    }
    Ok(())
}
