//! Multi-order sky localization maps and their derived views.
//!
//! A localization is a posterior probability distribution over directions on
//! the sky (optionally with per-direction distance parameters), stored as a
//! sparse set of HEALPix tiles of mixed resolution. This crate validates such
//! maps and turns them into the views downstream tools consume: flat rasters,
//! fixed-order tile sets for overlap queries, and point summaries.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`map`] | [`MultiOrderMap`](map::MultiOrderMap): validation, table views, credible areas |
//! | [`raster`] | Full-sky flat rasters in RING order ([`rasterize`](raster::rasterize), [`rasterize_3d`](raster::rasterize_3d)) |
//! | [`materialize`] | Fixed-order [`SpatialTile`](materialize::SpatialTile)s for the spatial index |
//! | [`tile_table`] | Memory-mapped on-disk tile tables with overlap queries |
//! | [`summary`] | Peak location, galactic projection, dust extinction |
//! | [`dustmap`] | File-backed E(B−V) lookup on a HEALPix grid |
//! | [`fits`] | FITS binary-table reading and writing of UNIQ tables |
//! | [`ingest`] | CSV reading and writing, and [`read_skymap`](ingest::read_skymap) for either format |
//! | [`record`], [`access`], [`store`], [`cache`] | Stored records, ownership checks, cascading deletion, memoized views |
//! | [`config`] | JSON configuration |
//!
//! # Quick Start
//!
//! ```
//! use skymap_localization::map::MultiOrderMap;
//! use skymap_localization::raster::rasterize;
//!
//! // The 12 base tiles, uniform over the sphere.
//! let uniform = 1.0 / (4.0 * std::f64::consts::PI);
//! let map = MultiOrderMap::new((4..16).collect(), vec![uniform; 12], None).unwrap();
//!
//! let raster = rasterize(&map, 2).unwrap();
//! assert_eq!(raster.len(), 192);
//! assert!((raster.total_probability() - 1.0).abs() < 1e-12);
//! ```
//!
//! # Features
//!
//! - **`cli`**: enables the `skymap` binary for inspecting, rasterizing,
//!   materializing and summarizing maps from the command line.

pub mod access;
pub mod cache;
pub mod config;
pub mod dustmap;
pub mod errors;
pub mod fits;
pub mod ingest;
pub mod map;
pub mod materialize;
pub mod raster;
pub mod record;
pub mod store;
pub mod summary;
pub mod tile_table;

pub use errors::{ExtinctionError, LocalizationError, LocalizationResult};
pub use map::MultiOrderMap;
pub use record::LocalizationId;
