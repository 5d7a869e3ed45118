use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use wallgallery::filter::{ResolutionTier, SortMode};

#[derive(Parser)]
#[command(name = "wallgallery")]
#[command(version)]
#[command(about = "Wallpaper catalog browser for CDN-hosted or mirrored galleries")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Catalog data source: base URL or local mirror directory
    #[arg(short, long, global = true)]
    pub(crate) data: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List the built-in series
    Series,
    /// Load a series and print the filtered, sorted wallpapers
    List(ListArgs),
    /// Show the categories of a series with item counts
    Categories {
        /// Series id (default: last opened)
        #[arg(short, long)]
        series: Option<String>,
    },
    /// Show one wallpaper with its neighbours
    Show {
        /// Wallpaper id
        id: String,
        #[arg(short, long)]
        series: Option<String>,
    },
    /// Summarize a series: formats, total size and most popular images
    Stats {
        #[arg(short, long)]
        series: Option<String>,
        /// Number of popular images to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
    /// Encode plain text (a file or stdin) into a catalog blob
    Encode {
        file: Option<PathBuf>,
    },
    /// Decode a catalog blob (a file or stdin) back to plain text
    Decode {
        file: Option<PathBuf>,
    },
    /// Manage on-disk caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
pub(crate) struct ListArgs {
    /// Series id (default: last opened)
    #[arg(short, long)]
    pub(crate) series: Option<String>,

    /// Sort mode (newest, popular, weekly-hot, largest, name-asc, ...)
    #[arg(long)]
    pub(crate) sort: Option<SortMode>,

    /// Category to show, or "all"
    #[arg(short = 'C', long)]
    pub(crate) category: Option<String>,

    #[arg(long)]
    pub(crate) subcategory: Option<String>,

    /// Text matched against filename, category, subcategory and tags
    #[arg(short = 'q', long)]
    pub(crate) search: Option<String>,

    /// Image format (jpg, png, ...)
    #[arg(short, long)]
    pub(crate) format: Option<String>,

    /// Resolution tier (4K, 5K+, FHD, ...)
    #[arg(short, long)]
    pub(crate) resolution: Option<ResolutionTier>,

    /// Also load this year of a daily series
    #[arg(long)]
    pub(crate) year: Option<i32>,

    /// Maximum number of rows (0 = all)
    #[arg(short = 'n', long, default_value = "50")]
    pub(crate) limit: usize,

    /// Print JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,

    /// Refetch the series index
    #[arg(long)]
    pub(crate) refresh: bool,
}

#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Delete cached stats snapshots
    Clear {
        /// Only this series
        #[arg(short, long)]
        series: Option<String>,
    },
}
