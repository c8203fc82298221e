use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::spherical_from_cartesian;
use crate::{Angle, CoordError, CoordResult};

/// Equatorial direction in the ICRS frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ICRSPosition {
    ra: Angle,
    dec: Angle,
}

impl ICRSPosition {
    pub fn new(ra: Angle, dec: Angle) -> CoordResult<Self> {
        let ra = ra.validate_longitude()?;
        let dec = dec.validate_latitude()?;
        Ok(Self { ra, dec })
    }

    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> CoordResult<Self> {
        Self::new(Angle::from_degrees(ra_deg), Angle::from_degrees(dec_deg))
    }

    pub fn ra(&self) -> Angle {
        self.ra
    }

    pub fn dec(&self) -> Angle {
        self.dec
    }

    pub fn ra_degrees(&self) -> f64 {
        self.ra.degrees()
    }

    pub fn dec_degrees(&self) -> f64 {
        self.dec.degrees()
    }

    pub fn unit_vector(&self) -> [f64; 3] {
        let (sin_dec, cos_dec) = self.dec.sin_cos();
        let (sin_ra, cos_ra) = self.ra.sin_cos();
        [cos_dec * cos_ra, cos_dec * sin_ra, sin_dec]
    }

    pub fn from_unit_vector(v: [f64; 3]) -> CoordResult<Self> {
        let r = libm::sqrt(v[0] * v[0] + v[1] * v[1] + v[2] * v[2]);
        if r == 0.0 || !r.is_finite() {
            return Err(CoordError::invalid_coordinate("Zero or non-finite vector"));
        }
        let (ra, dec) = spherical_from_cartesian([v[0] / r, v[1] / r, v[2] / r]);
        Self::new(Angle::from_radians(ra), Angle::from_radians(dec))
    }
}

impl fmt::Display for ICRSPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ICRS(ra={:.6}°, dec={:.6}°)",
            self.ra.degrees(),
            self.dec.degrees()
        )
    }
}
