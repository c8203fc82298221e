//! UNIQ tile identifiers and hierarchical containment.
//!
//! A [`Tile`] is an `(order, ipix)` pair in the nested scheme. Its UNIQ value
//! is `4 * 4^order + ipix`, which places all order-`k` tiles in the half-open
//! interval `[4^(k+1), 4^(k+2))`. Decoding reads the order back from the
//! highest set bit.
//!
//! In the nested scheme the descendants of a tile at any finer depth form one
//! contiguous index range, so containment and overlap reduce to integer
//! comparisons on [`Tile::nested_range`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::MAX_ORDER;
use crate::errors::{HealpixError, HealpixResult};
use crate::geometry::{npix, pixel_area_sr};

/// One cell of the nested HEALPix partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tile {
    order: u32,
    ipix: u64,
}

impl Tile {
    /// Creates a tile, checking the order and pixel bounds.
    pub fn new(order: u32, ipix: u64) -> HealpixResult<Self> {
        if order > MAX_ORDER {
            return Err(HealpixError::invalid_order(
                order,
                format!("maximum supported order is {}", MAX_ORDER),
            ));
        }
        let n = npix(order);
        if ipix >= n {
            return Err(HealpixError::InvalidPixel {
                order,
                ipix,
                npix: n,
            });
        }
        Ok(Self { order, ipix })
    }

    /// Decodes a UNIQ identifier.
    ///
    /// # Errors
    /// [`HealpixError::InvalidTileId`] if `uniq < 4` or the encoded order is
    /// deeper than [`MAX_ORDER`].
    pub fn from_uniq(uniq: u64) -> HealpixResult<Self> {
        if uniq < 4 {
            return Err(HealpixError::invalid_tile_id(
                uniq,
                "values below 4 do not encode any order",
            ));
        }
        let msb = 63 - uniq.leading_zeros();
        let order = msb / 2 - 1;
        if order > MAX_ORDER {
            return Err(HealpixError::invalid_tile_id(
                uniq,
                format!("encoded order {} exceeds maximum {}", order, MAX_ORDER),
            ));
        }
        let ipix = uniq - (4u64 << (2 * order));
        Ok(Self { order, ipix })
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn ipix(&self) -> u64 {
        self.ipix
    }

    pub fn uniq(&self) -> u64 {
        (4u64 << (2 * self.order)) + self.ipix
    }

    /// Solid angle covered by the tile, in steradians.
    pub fn solid_angle(&self) -> f64 {
        pixel_area_sr(self.order)
    }

    /// The tile at a coarser (or equal) order that contains this one.
    pub fn ancestor(&self, order: u32) -> HealpixResult<Self> {
        if order > self.order {
            return Err(HealpixError::invalid_order(
                order,
                format!(
                    "ancestor order must not exceed the tile order {}",
                    self.order
                ),
            ));
        }
        Ok(Self {
            order,
            ipix: self.ipix >> (2 * (self.order - order)),
        })
    }

    /// Nested indices covered by this tile at `depth >= order`.
    pub fn nested_range(&self, depth: u32) -> HealpixResult<Range<u64>> {
        if depth < self.order || depth > MAX_ORDER {
            return Err(HealpixError::invalid_order(
                depth,
                format!("range depth must lie in [{}, {}]", self.order, MAX_ORDER),
            ));
        }
        let shift = 2 * (depth - self.order);
        Ok((self.ipix << shift)..((self.ipix + 1) << shift))
    }

    /// Range covered at [`MAX_ORDER`]; comparable across any two tiles.
    pub fn finest_range(&self) -> Range<u64> {
        let shift = 2 * (MAX_ORDER - self.order);
        (self.ipix << shift)..((self.ipix + 1) << shift)
    }

    /// True if `other` is this tile or one of its descendants.
    pub fn contains(&self, other: &Tile) -> bool {
        other.order >= self.order && (other.ipix >> (2 * (other.order - self.order))) == self.ipix
    }

    /// True if the two tiles share any area.
    pub fn overlaps(&self, other: &Tile) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The four children one order deeper.
    pub fn children(&self) -> HealpixResult<[Tile; 4]> {
        if self.order >= MAX_ORDER {
            return Err(HealpixError::invalid_order(
                self.order,
                "tiles at the maximum order have no children",
            ));
        }
        let order = self.order + 1;
        let base = self.ipix << 2;
        Ok([0, 1, 2, 3].map(|k| Tile {
            order,
            ipix: base + k,
        }))
    }
}

impl Ord for Tile {
    /// Sky position first (start of the finest range), then coarser tiles
    /// before the finer tiles they contain.
    fn cmp(&self, other: &Self) -> Ordering {
        self.finest_range()
            .start
            .cmp(&other.finest_range().start)
            .then(self.order.cmp(&other.order))
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile(order={}, ipix={})", self.order, self.ipix)
    }
}

/// Encodes `(order, ipix)` as a UNIQ identifier.
pub fn encode(order: u32, ipix: u64) -> HealpixResult<u64> {
    Tile::new(order, ipix).map(|tile| tile.uniq())
}

/// Decodes a UNIQ identifier into `(order, ipix)`.
pub fn decode(uniq: u64) -> HealpixResult<(u32, u64)> {
    Tile::from_uniq(uniq).map(|tile| (tile.order, tile.ipix))
}

/// Solid angle of the tile identified by `uniq`, in steradians.
pub fn solid_angle(uniq: u64) -> HealpixResult<f64> {
    Tile::from_uniq(uniq).map(|tile| tile.solid_angle())
}

/// UNIQ identifier of the ancestor of `uniq` at `order`.
pub fn ancestor_at(uniq: u64, order: u32) -> HealpixResult<u64> {
    Tile::from_uniq(uniq)?.ancestor(order).map(|tile| tile.uniq())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_order_zero_ids() {
        assert_eq!(encode(0, 0).unwrap(), 4);
        assert_eq!(encode(0, 11).unwrap(), 15);
        assert_eq!(encode(1, 0).unwrap(), 16);
        assert_eq!(decode(15).unwrap(), (0, 11));
        assert_eq!(decode(16).unwrap(), (1, 0));
    }

    #[test]
    fn test_roundtrip_low_orders() {
        for order in 0..5 {
            for ipix in 0..npix(order) {
                let uniq = encode(order, ipix).unwrap();
                assert_eq!(decode(uniq).unwrap(), (order, ipix));
            }
        }
    }

    #[test]
    fn test_encode_injective() {
        let mut seen = HashSet::new();
        for order in 0..5 {
            for ipix in 0..npix(order) {
                assert!(seen.insert(encode(order, ipix).unwrap()));
            }
        }
    }

    #[test]
    fn test_roundtrip_max_order_edges() {
        let last = npix(MAX_ORDER) - 1;
        let uniq = encode(MAX_ORDER, last).unwrap();
        assert_eq!(uniq, (1u64 << 62) - 1);
        assert_eq!(decode(uniq).unwrap(), (MAX_ORDER, last));
        assert_eq!(decode(encode(MAX_ORDER, 0).unwrap()).unwrap(), (MAX_ORDER, 0));
    }

    #[test]
    fn test_decode_rejects_invalid_ids() {
        for uniq in [0, 1, 2, 3] {
            assert!(matches!(
                decode(uniq),
                Err(HealpixError::InvalidTileId { .. })
            ));
        }
        assert!(matches!(
            decode(1u64 << 62),
            Err(HealpixError::InvalidTileId { .. })
        ));
        assert!(decode(u64::MAX).is_err());
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(matches!(
            encode(0, 12),
            Err(HealpixError::InvalidPixel { .. })
        ));
        assert!(matches!(
            encode(MAX_ORDER + 1, 0),
            Err(HealpixError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn test_ancestor_and_containment() {
        let child = Tile::new(4, 0b1011_0110).unwrap();
        let parent = child.ancestor(2).unwrap();
        assert_eq!(parent.ipix(), 0b1011);
        assert!(parent.contains(&child));
        assert!(!child.contains(&parent));
        assert!(parent.overlaps(&child) && child.overlaps(&parent));
        assert_eq!(child.ancestor(4).unwrap(), child);
        assert!(child.ancestor(5).is_err());

        let uniq = child.uniq();
        assert_eq!(ancestor_at(uniq, 2).unwrap(), parent.uniq());
    }

    #[test]
    fn test_nested_range_containment() {
        let parent = Tile::new(1, 5).unwrap();
        assert_eq!(parent.nested_range(3).unwrap(), 80..96);
        for ipix in 80..96 {
            assert!(parent.contains(&Tile::new(3, ipix).unwrap()));
        }
        assert!(!parent.contains(&Tile::new(3, 96).unwrap()));
        assert!(parent.nested_range(0).is_err());

        let fine = parent.finest_range();
        let child = Tile::new(3, 81).unwrap().finest_range();
        assert!(fine.start <= child.start && child.end <= fine.end);
    }

    #[test]
    fn test_children() {
        let tile = Tile::new(0, 3).unwrap();
        let children = tile.children().unwrap();
        assert_eq!(children.map(|t| t.ipix()), [12, 13, 14, 15]);
        assert!(children.iter().all(|c| tile.contains(c)));
        let area: f64 = children.iter().map(Tile::solid_angle).sum();
        assert!((area - tile.solid_angle()).abs() < 1e-15);
    }

    #[test]
    fn test_ordering_puts_ancestor_first() {
        let mut tiles = vec![
            Tile::new(2, 1).unwrap(),
            Tile::new(0, 0).unwrap(),
            Tile::new(1, 0).unwrap(),
            Tile::new(0, 1).unwrap(),
        ];
        tiles.sort();
        assert_eq!(
            tiles.iter().map(|t| (t.order(), t.ipix())).collect::<Vec<_>>(),
            vec![(0, 0), (1, 0), (2, 1), (0, 1)]
        );
    }

    #[test]
    fn test_solid_angle() {
        let whole_sky: f64 = (4..16).map(|u| solid_angle(u).unwrap()).sum();
        assert!((whole_sky - 4.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
