//! NESTED → RING renumbering.
//!
//! Flat rasters are handed to consumers in the RING scheme: pixel 0 is the
//! first pixel of the northernmost ring, indices run eastward along each ring
//! and rings run from the north pole to the south pole.

use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::{npix, nside};
use crate::nested::{pix2xyf_nest, RingLocation};

/// Pixel numbering scheme of a flat array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelOrdering {
    Nested,
    Ring,
}

/// Ring index of a nested pixel.
pub fn nest2ring(order: u32, ipix: u64) -> u64 {
    let (face, ix, iy) = pix2xyf_nest(order, ipix);
    let loc = RingLocation::new(order, face, ix, iy);
    let nside = nside(order) as i64;
    let nl4 = 4 * nside;

    let n_before = if loc.ring < nside {
        2 * loc.nr * (loc.nr - 1)
    } else if loc.ring > 3 * nside {
        npix(order) as i64 - 2 * (loc.nr + 1) * loc.nr
    } else {
        let ncap = 2 * nside * (nside - 1);
        ncap + (loc.ring - nside) * nl4
    };

    (n_before + loc.jp - 1) as u64
}

/// Permutation table: entry `i` is the ring index of nested pixel `i`.
pub fn nest_to_ring_table(order: u32) -> Vec<u64> {
    (0..npix(order))
        .into_par_iter()
        .map(|ipix| nest2ring(order, ipix))
        .collect()
}

/// Reorder a full-sky nested array into ring order.
///
/// # Panics
/// If `values.len() != 12 * 4^order`.
pub fn reorder_nest_to_ring<T: Copy + Default + Send + Sync>(order: u32, values: &[T]) -> Vec<T> {
    let table = nest_to_ring_table(order);
    reorder_with_table(&table, values)
}

/// Reorder using a precomputed [`nest_to_ring_table`], so several columns of
/// the same raster share one permutation.
pub fn reorder_with_table<T: Copy + Default>(table: &[u64], values: &[T]) -> Vec<T> {
    assert_eq!(
        table.len(),
        values.len(),
        "array length does not match the permutation table"
    );
    let mut out = vec![T::default(); values.len()];
    for (&ring, &value) in table.iter().zip(values) {
        out[ring as usize] = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested::pix2ang_nest;

    #[test]
    fn test_order_zero_faces() {
        let expected = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        for (face, &ring) in expected.iter().enumerate() {
            assert_eq!(nest2ring(0, face as u64), ring);
        }
    }

    #[test]
    fn test_known_order_one_values() {
        assert_eq!(nest2ring(1, 0), 13);
        assert_eq!(nest2ring(1, 3), 0);
        assert_eq!(nest2ring(1, 44), 47);
        assert_eq!(nest2ring(1, 47), 35);
    }

    #[test]
    fn test_table_is_permutation() {
        for order in 0..5 {
            let mut table = nest_to_ring_table(order);
            table.sort_unstable();
            let expected: Vec<u64> = (0..npix(order)).collect();
            assert_eq!(table, expected);
        }
    }

    #[test]
    fn test_ring_order_runs_north_to_south() {
        let order = 3;
        let table = nest_to_ring_table(order);
        let mut dec_by_ring = vec![0.0; table.len()];
        for (nest, &ring) in table.iter().enumerate() {
            dec_by_ring[ring as usize] = pix2ang_nest(order, nest as u64).1;
        }
        for pair in dec_by_ring.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_reorder_moves_values() {
        let values: Vec<u64> = (0..48).collect();
        let reordered = reorder_nest_to_ring(1, &values);
        assert_eq!(reordered[13], 0);
        assert_eq!(reordered[0], 3);
        assert_eq!(reordered[47], 44);
        assert_eq!(reordered[35], 47);
    }
}
