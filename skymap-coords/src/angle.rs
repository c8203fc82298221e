//! Plane angles stored in radians.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{DEG_TO_RAD, HALF_PI, RAD_TO_DEG, TWOPI};
use crate::errors::{CoordError, CoordResult};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Angle {
    rad: f64,
}

impl Angle {
    pub const ZERO: Self = Self { rad: 0.0 };
    pub const HALF_PI: Self = Self { rad: HALF_PI };

    #[inline]
    pub const fn from_radians(rad: f64) -> Self {
        Self { rad }
    }

    #[inline]
    pub fn from_degrees(deg: f64) -> Self {
        Self {
            rad: deg * DEG_TO_RAD,
        }
    }

    #[inline]
    pub fn radians(self) -> f64 {
        self.rad
    }

    #[inline]
    pub fn degrees(self) -> f64 {
        self.rad * RAD_TO_DEG
    }

    #[inline]
    pub fn sin_cos(self) -> (f64, f64) {
        libm::sincos(self.rad)
    }

    /// Validates a longitude-like angle (RA, galactic l) and wraps it into [0, 2π).
    pub fn validate_longitude(self) -> CoordResult<Self> {
        if !self.rad.is_finite() {
            return Err(CoordError::not_finite("validate_longitude"));
        }
        Ok(Self::from_radians(wrap_0_2pi(self.rad)))
    }

    /// Validates a latitude-like angle (Dec, galactic b) against [-π/2, π/2].
    pub fn validate_latitude(self) -> CoordResult<Self> {
        if !self.rad.is_finite() {
            return Err(CoordError::not_finite("validate_latitude"));
        }
        if (-HALF_PI..=HALF_PI).contains(&self.rad) {
            return Ok(self);
        }
        Err(CoordError::invalid_coordinate(format!(
            "latitude {:.2}° out of range [-90°, +90°]",
            self.degrees()
        )))
    }
}

/// Wrap to [0, 2π). Uses `fmod` so negative inputs land on the positive side.
pub fn wrap_0_2pi(x: f64) -> f64 {
    let wrapped = libm::fmod(x, TWOPI);
    let wrapped = if wrapped < 0.0 { wrapped + TWOPI } else { wrapped };
    if wrapped >= TWOPI {
        0.0
    } else {
        wrapped
    }
}
