//! CLI argument definitions for skymap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skymap")]
#[command(about = "Inspect and transform multi-order sky localization maps")]
#[command(version)]
pub struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, value_enum, global = true, default_value = "info")]
    pub log_level: LogLevel,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print map statistics and credible areas
    Info(InfoArgs),

    /// Write a full-sky RING-ordered raster as raw little-endian f64
    Rasterize(RasterizeArgs),

    /// Write fixed-order tiles to a tile table
    Materialize(MaterializeArgs),

    /// Print the peak location, galactic projection and extinction as JSON
    Summary(SummaryArgs),

    /// Query a tile table with a footprint
    Overlap(OverlapArgs),
}

#[derive(Parser)]
pub struct InfoArgs {
    /// UNIQ table (FITS or CSV, optionally gzipped)
    pub map: PathBuf,

    /// Credible levels to report
    #[arg(long, value_delimiter = ',', default_value = "0.5,0.9")]
    pub levels: Vec<f64>,
}

#[derive(Parser)]
pub struct RasterizeArgs {
    /// UNIQ table (FITS or CSV, optionally gzipped)
    pub map: PathBuf,

    /// HEALPix order of the raster (nside = 2^order)
    #[arg(long)]
    pub order: u32,

    /// Output path prefix; one `<prefix>.<column>.f64` file per column
    #[arg(long)]
    pub output: PathBuf,

    /// Also write DISTMU, DISTSIGMA and DISTNORM for 3D maps
    #[arg(long)]
    pub distance: bool,
}

#[derive(Parser)]
pub struct MaterializeArgs {
    /// UNIQ table (FITS or CSV, optionally gzipped)
    pub map: PathBuf,

    /// Tile order; defaults to the map's finest order
    #[arg(long)]
    pub order: Option<u32>,

    /// Output tile table
    #[arg(long)]
    pub output: PathBuf,

    /// Localization id to record (random if omitted)
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Parser)]
pub struct SummaryArgs {
    /// UNIQ table (FITS or CSV, optionally gzipped)
    pub map: PathBuf,

    /// Dust map (overrides the configuration)
    #[arg(long)]
    pub dustmap: Option<PathBuf>,

    /// Raster order used for peak finding (overrides the configuration)
    #[arg(long)]
    pub working_order: Option<u32>,

    /// Credible levels to report
    #[arg(long, value_delimiter = ',', default_value = "0.5,0.9")]
    pub levels: Vec<f64>,
}

#[derive(Parser)]
pub struct OverlapArgs {
    /// Tile table written by `materialize`
    pub table: PathBuf,

    /// Footprint as comma-separated UNIQ ids of any order
    #[arg(long, value_delimiter = ',', required = true)]
    pub footprint: Vec<u64>,

    /// List the overlapping tiles
    #[arg(long)]
    pub list: bool,
}
