//! Pixel counts, areas and angular distances.

use crate::constants::{BASE_TILES, DEG_TO_RAD, FOUR_PI, MAX_ORDER, RAD_TO_DEG, SQDEG_PER_SR};
use crate::errors::{HealpixError, HealpixResult};

/// HEALPix nside for an order (`2^order`).
#[inline]
pub fn nside(order: u32) -> u64 {
    1u64 << order
}

/// Number of pixels covering the sphere at an order (`12 * 4^order`).
#[inline]
pub fn npix(order: u32) -> u64 {
    BASE_TILES << (2 * order)
}

/// Recover the order from an nside, which must be a power of two.
pub fn order_from_nside(nside: u64) -> HealpixResult<u32> {
    if nside == 0 || !nside.is_power_of_two() {
        return Err(HealpixError::invalid_order(
            0,
            format!("nside {} is not a power of two", nside),
        ));
    }
    let order = nside.trailing_zeros();
    if order > MAX_ORDER {
        return Err(HealpixError::invalid_order(
            order,
            format!("nside {} exceeds the maximum order {}", nside, MAX_ORDER),
        ));
    }
    Ok(order)
}

/// Solid angle of a single pixel at `order`, in steradians.
#[inline]
pub fn pixel_area_sr(order: u32) -> f64 {
    FOUR_PI / npix(order) as f64
}

/// Area of a single pixel at `order`, in square degrees.
#[inline]
pub fn pixel_area_deg2(order: u32) -> f64 {
    pixel_area_sr(order) * SQDEG_PER_SR
}

/// Characteristic pixel size (square root of its area), in degrees.
pub fn pixel_resolution_deg(order: u32) -> f64 {
    libm::sqrt(pixel_area_deg2(order))
}

/// Smallest order whose pixel size is at or below `resolution_deg`.
///
/// Capped at [`MAX_ORDER`].
pub fn order_for_resolution(resolution_deg: f64) -> u32 {
    (0..=MAX_ORDER)
        .find(|&order| pixel_resolution_deg(order) <= resolution_deg)
        .unwrap_or(MAX_ORDER)
}

/// Angular distance between two points, in degrees (Vincenty formula).
///
/// Accurate at all separations, including antipodal points.
pub fn angular_separation_deg(ra1_deg: f64, dec1_deg: f64, ra2_deg: f64, dec2_deg: f64) -> f64 {
    let (sin_lat1, cos_lat1) = libm::sincos(dec1_deg * DEG_TO_RAD);
    let (sin_lat2, cos_lat2) = libm::sincos(dec2_deg * DEG_TO_RAD);
    let (sin_dlon, cos_dlon) = libm::sincos((ra2_deg - ra1_deg) * DEG_TO_RAD);

    let num = libm::sqrt(
        (cos_lat2 * sin_dlon).powi(2) + (cos_lat1 * sin_lat2 - sin_lat1 * cos_lat2 * cos_dlon).powi(2),
    );
    let den = sin_lat1 * sin_lat2 + cos_lat1 * cos_lat2 * cos_dlon;

    libm::atan2(num, den) * RAD_TO_DEG
}
