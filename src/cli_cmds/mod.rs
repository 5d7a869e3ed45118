mod browse;
mod cache;
mod codec;

pub use browse::{cmd_categories, cmd_list, cmd_series, cmd_show, cmd_stats};
pub use cache::cmd_cache_clear;
pub use codec::{cmd_decode, cmd_encode};
