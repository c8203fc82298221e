use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::spherical_from_cartesian;
use crate::constants::GALACTIC_TO_ICRS;
use crate::{Angle, CoordResult, ICRSPosition};

/// Galactic longitude `l` in [0°, 360°) and latitude `b` in [-90°, 90°].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalacticPosition {
    l: Angle,
    b: Angle,
}

impl GalacticPosition {
    pub fn new(l: Angle, b: Angle) -> CoordResult<Self> {
        let l = l.validate_longitude()?;
        let b = b.validate_latitude()?;
        Ok(Self { l, b })
    }

    pub fn from_degrees(l_deg: f64, b_deg: f64) -> CoordResult<Self> {
        Self::new(Angle::from_degrees(l_deg), Angle::from_degrees(b_deg))
    }

    pub fn longitude(&self) -> Angle {
        self.l
    }

    pub fn latitude(&self) -> Angle {
        self.b
    }

    pub fn north_galactic_pole() -> Self {
        Self {
            l: Angle::ZERO,
            b: Angle::HALF_PI,
        }
    }

    pub fn to_icrs(&self) -> CoordResult<ICRSPosition> {
        let (sin_b, cos_b) = self.b.sin_cos();
        let (sin_l, cos_l) = self.l.sin_cos();
        let gal = [cos_l * cos_b, sin_l * cos_b, sin_b];

        // icrs = Mᵀ · gal
        let m = &GALACTIC_TO_ICRS;
        let icrs = [
            m[0][0] * gal[0] + m[1][0] * gal[1] + m[2][0] * gal[2],
            m[0][1] * gal[0] + m[1][1] * gal[1] + m[2][1] * gal[2],
            m[0][2] * gal[0] + m[1][2] * gal[1] + m[2][2] * gal[2],
        ];

        let (ra, dec) = spherical_from_cartesian(icrs);
        ICRSPosition::new(Angle::from_radians(ra), Angle::from_radians(dec))
    }

    pub fn from_icrs(icrs: &ICRSPosition) -> CoordResult<Self> {
        let v = icrs.unit_vector();

        // gal = M · icrs
        let m = &GALACTIC_TO_ICRS;
        let gal = [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ];

        let (l, b) = spherical_from_cartesian(gal);
        Self::new(Angle::from_radians(l), Angle::from_radians(b))
    }
}

impl fmt::Display for GalacticPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Galactic(l={:.6}°, b={:.6}°)",
            self.l.degrees(),
            self.b.degrees()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_galactic_creation() {
        let pos = GalacticPosition::from_degrees(45.0, 30.0).unwrap();
        assert!((pos.longitude().degrees() - 45.0).abs() < 1e-12);
        assert!((pos.latitude().degrees() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_galactic_validation() {
        let pos = GalacticPosition::from_degrees(380.0, 45.0).unwrap();
        assert!((pos.longitude().degrees() - 20.0).abs() < 1e-12);
        assert!(GalacticPosition::from_degrees(0.0, 95.0).is_err());
        assert!(GalacticPosition::from_degrees(0.0, -95.0).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let gal = GalacticPosition::from_degrees(45.0, 30.0).unwrap();
        let back = GalacticPosition::from_icrs(&gal.to_icrs().unwrap()).unwrap();
        assert!((back.longitude().degrees() - 45.0).abs() < 1e-10);
        assert!((back.latitude().degrees() - 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_north_galactic_pole_in_icrs() {
        let ngp = GalacticPosition::north_galactic_pole().to_icrs().unwrap();
        assert!((ngp.ra_degrees() - 192.859508).abs() < 1e-4);
        assert!((ngp.dec_degrees() - 27.128336).abs() < 1e-4);
    }

    #[test]
    fn test_galactic_center_from_icrs() {
        let gc = ICRSPosition::from_degrees(266.404988, -28.936175).unwrap();
        let gal = GalacticPosition::from_icrs(&gc).unwrap();
        let l = gal.longitude().degrees();
        let l = if l > 180.0 { l - 360.0 } else { l };
        assert!(l.abs() < 1e-4, "l = {}", l);
        assert!(gal.latitude().degrees().abs() < 1e-4);
    }

    #[test]
    fn test_south_pole_of_equator_maps_below_plane() {
        // The south celestial pole sits at b ≈ -27.13°.
        let scp = ICRSPosition::from_degrees(0.0, -89.9999).unwrap();
        let gal = GalacticPosition::from_icrs(&scp).unwrap();
        assert!((gal.latitude().degrees() + 27.128).abs() < 1e-2);
    }
}
