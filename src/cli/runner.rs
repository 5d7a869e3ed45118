use anyhow::Result;
use clap::Parser;

use super::{CacheAction, Cli, Commands};
use crate::cli_cmds::*;
use wallgallery::app::Gallery;
use wallgallery::config::Config;

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::init_tracing(cli.verbose);

    // These need neither config nor network.
    let command = match cli.command {
        Commands::Encode { file } => return cmd_encode(file.as_deref()),
        Commands::Decode { file } => return cmd_decode(file.as_deref()),
        Commands::Series => {
            cmd_series();
            return Ok(());
        }
        command => command,
    };

    let config = load_config(&cli.config, cli.data)?;
    let gallery = Gallery::from_config(&config)?;

    match command {
        Commands::List(args) => {
            cmd_list(&gallery, args).await?;
        }
        Commands::Categories { series } => {
            cmd_categories(&gallery, series.as_deref()).await?;
        }
        Commands::Show { id, series } => {
            cmd_show(&gallery, &id, series.as_deref()).await?;
        }
        Commands::Stats { series, top } => {
            cmd_stats(&gallery, series.as_deref(), top).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear { series } => cmd_cache_clear(&gallery, series.as_deref())?,
        },
        Commands::Series | Commands::Encode { .. } | Commands::Decode { .. } => {}
    }

    Ok(())
}

fn load_config(path: &Option<std::path::PathBuf>, data: Option<String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data) = data {
        config.catalog.data_source = data;
    }
    Ok(config)
}
