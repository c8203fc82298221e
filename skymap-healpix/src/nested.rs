//! Coordinate ↔ pixel conversion in the nested scheme.
//!
//! Implements the Gorski et al. (2005) construction. A nested index packs the
//! base face in its top bits and a Z-order (Morton) interleave of the
//! in-face `(ix, iy)` position below:
//!
//! ```text
//! ipix = face * nside² + interleave(ix, iy)
//! ```

use crate::constants::{DEG_TO_RAD, HALF_PI, PI, RAD_TO_DEG, TWOPI};
use crate::geometry::{npix, nside};

/// Ring index of the southern vertex of each base face, in units of nside.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude index of the center of each base face, in units of π/4.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Convert (RA, Dec) in degrees to a nested pixel index.
///
/// # Arguments
/// * `order` - HEALPix order (nside = 2^order)
/// * `ra_deg` - Right ascension in degrees
/// * `dec_deg` - Declination in degrees
///
/// # Returns
/// Nested pixel index in range [0, 12*nside^2)
pub fn ang2pix_nest(order: u32, ra_deg: f64, dec_deg: f64) -> u64 {
    let phi = ra_deg * DEG_TO_RAD;
    let z = libm::sin(dec_deg * DEG_TO_RAD);
    let nside = nside(order);
    let (face, ix, iy) = compute_face_and_position(phi, z, nside);
    face as u64 * nside * nside + xy2pix_nest(ix, iy, order)
}

/// Center of a nested pixel as (RA, Dec) in degrees, RA in [0, 360).
pub fn pix2ang_nest(order: u32, ipix: u64) -> (f64, f64) {
    let (z, phi) = pix2zphi_nest(order, ipix);
    let dec = libm::asin(z.clamp(-1.0, 1.0)) * RAD_TO_DEG;
    let mut ra = phi * RAD_TO_DEG;
    if ra >= 360.0 {
        ra -= 360.0;
    }
    (ra, dec)
}

/// Center of a nested pixel as `(z = cos θ, φ)`.
pub fn pix2zphi_nest(order: u32, ipix: u64) -> (f64, f64) {
    let (face, ix, iy) = pix2xyf_nest(order, ipix);
    let loc = RingLocation::new(order, face, ix, iy);
    let nside = nside(order) as i64;
    let fact2 = 4.0 / npix(order) as f64;

    let z = if loc.ring < nside {
        1.0 - (loc.nr * loc.nr) as f64 * fact2
    } else if loc.ring > 3 * nside {
        (loc.nr * loc.nr) as f64 * fact2 - 1.0
    } else {
        let fact1 = (2 * nside) as f64 * fact2;
        (2 * nside - loc.ring) as f64 * fact1
    };
    let phi = (loc.jp as f64 - (loc.kshift + 1) as f64 * 0.5) * (HALF_PI / loc.nr as f64);
    (z, phi)
}

/// Split a nested index into `(face, ix, iy)`.
pub fn pix2xyf_nest(order: u32, ipix: u64) -> (u32, u64, u64) {
    let face_size = 1u64 << (2 * order);
    let face = (ipix / face_size) as u32;
    let (ix, iy) = pix2xy_nest(ipix & (face_size - 1), order);
    (face, ix, iy)
}

/// Ring-scheme position of a pixel: ring number `ring` (1-based from the
/// north pole), pixels in that ring quadrant `nr`, the ring's half-pixel
/// shift and the 1-based position `jp` along the ring.
pub(crate) struct RingLocation {
    pub(crate) ring: i64,
    pub(crate) nr: i64,
    pub(crate) kshift: i64,
    pub(crate) jp: i64,
}

impl RingLocation {
    pub(crate) fn new(order: u32, face: u32, ix: u64, iy: u64) -> Self {
        let nside = nside(order) as i64;
        let nl4 = 4 * nside;
        let (ix, iy) = (ix as i64, iy as i64);
        let face = face as usize;

        let ring = JRLL[face] * nside - ix - iy - 1;
        let (nr, kshift) = if ring < nside {
            (ring, 0)
        } else if ring > 3 * nside {
            (nl4 - ring, 0)
        } else {
            (nside, (ring - nside) & 1)
        };

        let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
        if jp > nl4 {
            jp -= nl4;
        }
        if jp < 1 {
            jp += nl4;
        }

        Self {
            ring,
            nr,
            kshift,
            jp,
        }
    }
}

/// Determine which of the 12 HEALPix base faces contains the point,
/// and compute the (ix, iy) position within that face.
fn compute_face_and_position(phi: f64, z: f64, nside: u64) -> (u32, u64, u64) {
    let z_abs = libm::fabs(z);
    let tt = phi_to_tt(phi);
    if z_abs <= 2.0 / 3.0 {
        compute_equatorial_face(tt, z, nside)
    } else {
        compute_polar_face(tt, z, z_abs, nside)
    }
}

/// Convert phi to tt in [0, 4), one unit per quadrant.
fn phi_to_tt(phi: f64) -> f64 {
    let mut phi = libm::fmod(phi, TWOPI);
    if phi < 0.0 {
        phi += TWOPI;
    }
    let tt = phi * 2.0 / PI;
    if tt >= 4.0 {
        0.0
    } else {
        tt
    }
}

/// Face and position for the equatorial belt (-2/3 <= z <= 2/3).
fn compute_equatorial_face(tt: f64, z: f64, nside: u64) -> (u32, u64, u64) {
    let temp1 = nside as f64 * (0.5 + tt);
    let temp2 = nside as f64 * z * 0.75;
    let jp = (temp1 - temp2) as u64;
    let jm = (temp1 + temp2) as u64;
    let order = nside.trailing_zeros();
    let ifp = jp >> order;
    let ifm = jm >> order;
    let face = if ifp == ifm {
        (ifp | 4) as u32
    } else if ifp < ifm {
        ifp as u32
    } else {
        (ifm + 8) as u32
    };
    let ix = jm & (nside - 1);
    let iy = nside - (jp & (nside - 1)) - 1;
    (face, ix, iy)
}

/// Face and position for the polar caps (|z| > 2/3).
fn compute_polar_face(tt: f64, z: f64, z_abs: f64, nside: u64) -> (u32, u64, u64) {
    let ntt = (libm::floor(tt) as u32).min(3);
    let tp = tt - ntt as f64;
    let tmp = nside as f64 * libm::sqrt(3.0 * (1.0 - z_abs));
    let jp = ((tp * tmp) as u64).min(nside - 1);
    let jm = (((1.0 - tp) * tmp) as u64).min(nside - 1);
    if z > 0.0 {
        (ntt, nside - jm - 1, nside - jp - 1)
    } else {
        (ntt + 8, jp, jm)
    }
}

/// Convert (ix, iy) to nested pixel index within a base face using Z-order curve.
fn xy2pix_nest(ix: u64, iy: u64, order: u32) -> u64 {
    let mut result: u64 = 0;
    for i in 0..order {
        let bit_x = (ix >> i) & 1;
        let bit_y = (iy >> i) & 1;
        result |= (bit_x << (2 * i)) | (bit_y << (2 * i + 1));
    }
    result
}

/// Inverse of [`xy2pix_nest`]: de-interleave even bits into x, odd into y.
fn pix2xy_nest(pix_in_face: u64, order: u32) -> (u64, u64) {
    let mut ix = 0u64;
    let mut iy = 0u64;
    for i in 0..order {
        ix |= ((pix_in_face >> (2 * i)) & 1) << i;
        iy |= ((pix_in_face >> (2 * i + 1)) & 1) << i;
    }
    (ix, iy)
}
