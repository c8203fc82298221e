mod galactic;
mod icrs;

pub use galactic::GalacticPosition;
pub use icrs::ICRSPosition;

/// Direction from a unit-sphere Cartesian vector as (longitude, latitude) radians.
pub(crate) fn spherical_from_cartesian(v: [f64; 3]) -> (f64, f64) {
    let d2 = v[0] * v[0] + v[1] * v[1];
    let lon = if d2 != 0.0 { libm::atan2(v[1], v[0]) } else { 0.0 };
    let lat = if d2 != 0.0 || v[2] != 0.0 {
        libm::atan2(v[2], libm::sqrt(d2))
    } else {
        0.0
    };
    (lon, lat)
}
