//! Wallpaper catalog client: encoded CDN catalogs, a merged per-series
//! collection loaded in the background, and a filtered, sorted view of it.

pub mod app;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod loader;
pub mod popularity;
pub mod series;
pub mod settings;
pub mod stats;
pub mod utils;

pub use app::Gallery;
pub use error::{ErrorKind, LoadError};
