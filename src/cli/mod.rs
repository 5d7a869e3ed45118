mod args;
mod runner;

pub(crate) use args::{CacheAction, Cli, Commands, ListArgs};
pub(crate) use runner::run;
