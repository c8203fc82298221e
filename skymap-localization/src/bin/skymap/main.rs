//! skymap: command-line access to multi-order sky localization maps
//!
//! Reads UNIQ tables from FITS or CSV and produces rasters, tile tables and
//! summaries.

mod cli;
mod info;
mod logging;
mod materialize;
mod overlap;
mod rasterize;
mod summary;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use skymap_localization::config::SkymapConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logger = logging::init(cli.log_level.as_str())?;

    let config = match &cli.config {
        Some(path) => SkymapConfig::load(path)
            .with_context(|| format!("Failed to load configuration: {:?}", path))?,
        None => SkymapConfig::default(),
    };

    match &cli.command {
        Commands::Info(args) => info::run(args),
        Commands::Rasterize(args) => rasterize::run(args),
        Commands::Materialize(args) => materialize::run(args),
        Commands::Summary(args) => summary::run(args, &config),
        Commands::Overlap(args) => overlap::run(args),
    }
}
