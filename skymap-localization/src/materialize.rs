//! Spatial-index tiles at a single fixed order.
//!
//! Materialized tiles are what gets written to the spatial index for overlap
//! queries against other footprints. Coarse source tiles are split into their
//! descendants at the chosen order; fine source tiles are folded into their
//! ancestor with area-weighted density, so the set covers exactly the
//! source map's footprint and carries the same probability mass.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use skymap_healpix::{Tile, MAX_ORDER};

use crate::errors::{LocalizationError, LocalizationResult};
use crate::map::MultiOrderMap;
use crate::record::LocalizationId;

/// One fixed-order tile tagged with the localization it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialTile {
    pub localization_id: LocalizationId,
    pub tile: Tile,
    pub probdensity: f64,
}

impl SpatialTile {
    pub fn order(&self) -> u32 {
        self.tile.order()
    }

    pub fn ipix(&self) -> u64 {
        self.tile.ipix()
    }

    pub fn tile(&self) -> Tile {
        self.tile
    }

    pub fn uniq(&self) -> u64 {
        self.tile().uniq()
    }

    /// Range of order-29 descendants, the key used for containment queries.
    pub fn finest_range(&self) -> Range<u64> {
        self.tile().finest_range()
    }

    pub fn probability(&self) -> f64 {
        self.probdensity * self.tile().solid_angle()
    }
}

/// Materializes `map` at `order`.
///
/// The result is sorted by `ipix`, has no duplicates, and covers exactly the
/// union of the source tiles.
///
/// # Errors
/// [`LocalizationError::UnsupportedResolution`] if `order` exceeds the
/// deepest HEALPix order, or the output would not fit a `u32` count.
pub fn materialize(
    id: LocalizationId,
    map: &MultiOrderMap,
    order: u32,
) -> LocalizationResult<Vec<SpatialTile>> {
    if order > MAX_ORDER {
        return Err(LocalizationError::unsupported_resolution(
            order,
            format!("deepest HEALPix order is {}", MAX_ORDER),
        ));
    }

    let count: u64 = map
        .tiles()
        .iter()
        .map(|t| {
            if t.order() <= order {
                1u64 << (2 * (order - t.order()))
            } else {
                1
            }
        })
        .sum();
    if count > u64::from(u32::MAX) {
        return Err(LocalizationError::unsupported_resolution(
            order,
            format!("materialization would produce {} tiles", count),
        ));
    }

    let density = map.probdensity();
    let mut out: Vec<SpatialTile> = Vec::with_capacity(count as usize);
    let mut push = |ipix: u64, probdensity: f64| -> LocalizationResult<()> {
        out.push(SpatialTile {
            localization_id: id,
            tile: Tile::new(order, ipix)?,
            probdensity,
        });
        Ok(())
    };

    // Sky order visits split ranges in ascending ipix, and fine tiles sharing
    // an ancestor are adjacent, so merging into the last entry is enough.
    let mut pending: Option<(u64, f64)> = None;
    for &row in map.sorted_rows() {
        let tile = map.tiles()[row];
        if tile.order() <= order {
            if let Some((ipix, d)) = pending.take() {
                push(ipix, d)?;
            }
            let shift = 2 * (order - tile.order());
            for ipix in (tile.ipix() << shift)..((tile.ipix() + 1) << shift) {
                push(ipix, density[row])?;
            }
        } else {
            let depth = tile.order() - order;
            let ipix = tile.ipix() >> (2 * depth);
            let weighted = density[row] * 0.25f64.powi(depth as i32);
            pending = match pending {
                Some((current, d)) if current == ipix => Some((current, d + weighted)),
                Some((current, d)) => {
                    push(current, d)?;
                    Some((ipix, weighted))
                }
                None => Some((ipix, weighted)),
            };
        }
    }
    if let Some((ipix, d)) = pending {
        push(ipix, d)?;
    }

    log::debug!(
        "materialized localization {} at order {}: {} -> {} tiles",
        id,
        order,
        map.len(),
        out.len()
    );
    Ok(out)
}

/// Materializes at the map's finest order, so no tile is aggregated.
pub fn materialize_native(
    id: LocalizationId,
    map: &MultiOrderMap,
) -> LocalizationResult<Vec<SpatialTile>> {
    materialize(id, map, map.max_order())
}
