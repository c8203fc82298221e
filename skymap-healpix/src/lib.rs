//! Nested HEALPix indexing for multi-order sky maps.
//!
//! HEALPix divides the sphere into 12 equal-area base tiles, each split
//! recursively into four children. At order `k` there are `12 * 4^k` tiles
//! (`nside = 2^k`). A multi-order map mixes tiles from several orders in one
//! flat collection; the UNIQ scheme makes that unambiguous by folding the
//! order into the identifier:
//!
//! ```text
//! uniq = 4 * 4^order + ipix
//! ```
//!
//! so every `(order, ipix)` pair maps to exactly one integer and the order can
//! be recovered from the position of the highest set bit.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`uniq`] | [`Tile`], [`encode`], [`decode`], ancestors and range containment |
//! | [`nested`] | Coordinate ↔ pixel conversion in the nested scheme, pixel centers |
//! | [`ring`] | NESTED → RING renumbering for flat rasters |
//! | [`geometry`] | Pixel counts, solid angles, angular separation |
//!
//! # Quick Start
//!
//! ```
//! use skymap_healpix::{decode, encode, Tile};
//!
//! let uniq = encode(3, 17).unwrap();
//! assert_eq!(decode(uniq).unwrap(), (3, 17));
//!
//! let parent = Tile::new(2, 4).unwrap();
//! let child = Tile::from_uniq(uniq).unwrap();
//! assert!(parent.contains(&child));
//! ```

pub mod constants;
pub mod errors;
pub mod geometry;
pub mod nested;
pub mod ring;
pub mod uniq;

pub use constants::MAX_ORDER;
pub use errors::{HealpixError, HealpixResult};
pub use geometry::{
    angular_separation_deg, npix, nside, order_for_resolution, order_from_nside, pixel_area_deg2,
    pixel_area_sr,
};
pub use nested::{ang2pix_nest, pix2ang_nest};
pub use ring::{nest2ring, reorder_nest_to_ring, PixelOrdering};
pub use uniq::{ancestor_at, decode, encode, solid_angle, Tile};
