//! Sky positions used by localization summaries.
//!
//! [`ICRSPosition`] holds an equatorial direction (right ascension,
//! declination); [`GalacticPosition`] holds galactic longitude and latitude.
//! Both are plain directions without distance. Conversion between them is the
//! fixed IAU rotation in [`constants::GALACTIC_TO_ICRS`].
//!
//! ```
//! use skymap_coords::{GalacticPosition, ICRSPosition};
//!
//! let ngp = GalacticPosition::north_galactic_pole().to_icrs().unwrap();
//! assert!((ngp.ra_degrees() - 192.859508).abs() < 1e-3);
//!
//! let gc = ICRSPosition::from_degrees(266.40499, -28.93617).unwrap();
//! let gal = GalacticPosition::from_icrs(&gc).unwrap();
//! assert!(gal.latitude().degrees().abs() < 1e-3);
//! ```

pub mod angle;
pub mod constants;
pub mod errors;
pub mod frames;

pub use angle::Angle;
pub use errors::{CoordError, CoordResult};
pub use frames::{GalacticPosition, ICRSPosition};
