use anyhow::{anyhow, Context, Result};
use std::time::Instant;

use crate::cli::ListArgs;
use wallgallery::app::Gallery;
use wallgallery::catalog::WallpaperItem;
use wallgallery::popularity::Window;
use wallgallery::series::SERIES;
use wallgallery::utils::{format_count, format_file_size};

/// Open a series (the last one by default) and wait for the whole
/// collection to be merged.
async fn open(gallery: &Gallery, series: Option<&str>, refresh: bool) -> Result<String> {
    let series = series
        .map(str::to_string)
        .unwrap_or_else(|| gallery.last_series());
    gallery
        .open_series(&series, refresh)
        .await
        .map_err(|e| anyhow!(e.user_message(&series)))?;
    gallery.wait_for_background().await;

    let snapshot = gallery.loader().snapshot();
    if let Some(failure) = snapshot.error {
        return Err(anyhow!(failure.message));
    }
    Ok(series)
}

fn resolution_label(item: &WallpaperItem) -> String {
    match &item.resolution {
        Some(r) => format!("{}x{}", r.width, r.height),
        None => "-".to_string(),
    }
}

fn category_label(item: &WallpaperItem) -> String {
    match &item.subcategory {
        Some(sub) => format!("{}/{}", item.category, sub),
        None => item.category.clone(),
    }
}

pub fn cmd_series() {
    for info in SERIES {
        let kind = if info.daily { "daily" } else { "categories" };
        println!(
            "{:<10} {:<12} {:<6} {}",
            info.id, info.name, info.aspect_ratio, kind
        );
    }
}

pub async fn cmd_list(gallery: &Gallery, args: ListArgs) -> Result<()> {
    let series = open(gallery, args.series.as_deref(), args.refresh).await?;

    if let Some(year) = args.year {
        gallery
            .loader()
            .load_year(&series, year)
            .await
            .map_err(|e| anyhow!(e.user_message(&series)))?;
    }

    {
        let mut filters = gallery.filters();
        if let Some(sort) = args.sort {
            filters.set_sort(sort);
        }
        if let Some(category) = args.category {
            filters.set_category(Some(category));
        }
        if let Some(subcategory) = args.subcategory {
            filters.set_subcategory(Some(subcategory));
        }
        filters.set_format(args.format);
        filters.set_resolution(args.resolution);
        if let Some(query) = args.search {
            filters.set_search_query(query, Instant::now());
            filters.flush_search();
        }
    }

    let visible = gallery.visible();
    let shown = if args.limit == 0 {
        &visible[..]
    } else {
        &visible[..args.limit.min(visible.len())]
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No wallpapers match the current filters.");
        return Ok(());
    }

    for item in shown {
        println!(
            "{:<32} {:<24} {:>11} {:>9} {}",
            item.id,
            category_label(item),
            resolution_label(item),
            format_file_size(item.size),
            item.created_at.format("%Y-%m-%d"),
        );
    }

    let sort = gallery.filters().state().sort_by;
    println!();
    println!(
        "{} of {} wallpapers in {} ({})",
        shown.len(),
        visible.len(),
        series,
        sort.display_name()
    );
    Ok(())
}

pub async fn cmd_categories(gallery: &Gallery, series: Option<&str>) -> Result<()> {
    let series = open(gallery, series, false).await?;

    println!("Categories in {}:", series);
    for option in gallery.category_options().iter() {
        println!("  {:<24} {:>6}", option.label(), option.count);
        for sub in &option.subcategories {
            println!("    {:<22} {:>6}", sub.name, sub.count);
        }
    }
    Ok(())
}

pub async fn cmd_show(gallery: &Gallery, id: &str, series: Option<&str>) -> Result<()> {
    let series = open(gallery, series, false).await?;
    let loader = gallery.loader();
    let item = loader
        .wallpaper_by_id(id)
        .with_context(|| format!("No wallpaper with id {} in {}", id, series))?;

    println!("{}", item.display_name());
    println!("  id:          {}", item.id);
    println!("  file:        {}", item.filename);
    println!("  category:    {}", category_label(&item));
    println!("  format:      {}", item.format);
    println!("  size:        {}", format_file_size(item.size));
    println!("  resolution:  {}", resolution_label(&item));
    println!("  created:     {}", item.created_at.format("%Y-%m-%d %H:%M"));
    if !item.tags.is_empty() {
        println!("  tags:        {}", item.tags.join(", "));
    }
    if let Some(daily) = &item.daily {
        println!("  title:       {}", daily.title);
        println!("  copyright:   {}", daily.copyright);
    }
    println!("  url:         {}", item.url);
    println!("  download:    {}", item.download_url);

    let popularity = gallery.popularity();
    let rank = popularity.rank(&item.filename);
    if rank > 0 {
        println!("  rank:        #{}", rank);
    }
    println!(
        "  views:       {}   downloads: {}",
        format_count(popularity.view_count(&item.filename)),
        format_count(popularity.download_count(&item.filename)),
    );

    let position = loader.wallpaper_index(id).map(|i| i + 1).unwrap_or(0);
    println!("  position:    {} of {}", position, loader.snapshot().items.len());
    if let Some(prev) = loader.prev_wallpaper(id) {
        println!("  prev:        {}", prev.id);
    }
    if let Some(next) = loader.next_wallpaper(id) {
        println!("  next:        {}", next.id);
    }

    gallery.record_view(&item).await;
    Ok(())
}

pub async fn cmd_stats(gallery: &Gallery, series: Option<&str>, top: usize) -> Result<()> {
    let series = open(gallery, series, false).await?;
    let stats = gallery.loader().statistics();

    println!("Series:      {}", series);
    println!("Wallpapers:  {}", stats.total);
    println!("JPG:         {}", stats.jpg);
    println!("PNG:         {}", stats.png);
    println!("Total size:  {}", stats.total_size_formatted);

    if top == 0 {
        return Ok(());
    }

    let snapshot = gallery.popularity_snapshot();
    let mut ranked: Vec<_> = snapshot.map_for(Window::All).iter().collect();
    if ranked.is_empty() {
        println!();
        println!("No popularity data for {}.", series);
        return Ok(());
    }
    ranked.sort_by_key(|(_, entry)| entry.rank);

    println!();
    println!("Most popular:");
    for (filename, entry) in ranked.into_iter().take(top) {
        println!(
            "  {:>3}. {:<40} {:>8} views {:>6} downloads",
            entry.rank,
            filename,
            format_count(entry.views),
            format_count(entry.downloads),
        );
    }
    Ok(())
}
