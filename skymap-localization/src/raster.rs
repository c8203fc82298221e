//! Fixed-resolution rasters of a multi-order map.
//!
//! Every cell of the output holds a probability *density*, like the source
//! map:
//!
//! - a source tile at or above the target resolution is split, and each of its
//!   `4^(order - tile_order)` cells receives the tile's density and distance
//!   parameters unchanged;
//! - source tiles finer than the target are folded into their ancestor cell,
//!   weighted by area fraction `4^-(tile_order - order)`. This conserves
//!   probability mass. Distance parameters use the same weights, normalized by
//!   the total weight that reached the cell.
//!
//! Cells covered by no tile have density 0 and NaN distance parameters.
//! Coarse targets are always aggregated; only orders whose flat array would
//! be impractically large are refused.
//!
//! The public rasters are in RING order, for the 2D and the 3D variants alike.
//! [`rasterize_nested`] exposes the hierarchical order directly.

use rayon::prelude::*;
use skymap_healpix::ring::{nest_to_ring_table, reorder_with_table, PixelOrdering};
use skymap_healpix::{npix, pixel_area_sr};

use crate::errors::{LocalizationError, LocalizationResult};
use crate::map::MultiOrderMap;

/// Deepest raster order accepted (12 · 4^13 ≈ 805 million cells).
pub const MAX_RASTER_ORDER: u32 = 13;

/// Cells handled per parallel work item.
const CHUNK_CELLS: usize = 1 << 14;

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRaster {
    pub distmu: Vec<f64>,
    pub distsigma: Vec<f64>,
    pub distnorm: Vec<f64>,
}

/// A full-sky flat array at one order.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    order: u32,
    ordering: PixelOrdering,
    prob: Vec<f64>,
    distance: Option<DistanceRaster>,
}

impl Raster {
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn nside(&self) -> u64 {
        1 << self.order
    }

    pub fn ordering(&self) -> PixelOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    pub fn is_3d(&self) -> bool {
        self.distance.is_some()
    }

    /// Probability density per cell.
    pub fn prob(&self) -> &[f64] {
        &self.prob
    }

    pub fn distance(&self) -> Option<&DistanceRaster> {
        self.distance.as_ref()
    }

    pub fn into_parts(self) -> (Vec<f64>, Option<DistanceRaster>) {
        (self.prob, self.distance)
    }

    pub fn cell_area_sr(&self) -> f64 {
        pixel_area_sr(self.order)
    }

    /// `Σ density · cell area`.
    pub fn total_probability(&self) -> f64 {
        self.prob.par_iter().sum::<f64>() * self.cell_area_sr()
    }

    /// Index of the densest cell; the lowest index wins ties.
    pub fn argmax(&self) -> Option<usize> {
        self.prob
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((i, value)),
            })
            .map(|(i, _)| i)
    }

    /// Converts a NESTED raster to RING order (no-op if already RING).
    pub fn into_ring(self) -> Self {
        if self.ordering == PixelOrdering::Ring {
            return self;
        }
        let table = nest_to_ring_table(self.order);
        let distance = self.distance.map(|d| DistanceRaster {
            distmu: reorder_with_table(&table, &d.distmu),
            distsigma: reorder_with_table(&table, &d.distsigma),
            distnorm: reorder_with_table(&table, &d.distnorm),
        });
        Self {
            order: self.order,
            ordering: PixelOrdering::Ring,
            prob: reorder_with_table(&table, &self.prob),
            distance,
        }
    }
}

/// Probability-only raster in RING order.
pub fn rasterize(map: &MultiOrderMap, order: u32) -> LocalizationResult<Raster> {
    Ok(rasterize_nested(map, order, false)?.into_ring())
}

/// Raster in RING order with distance columns. A 2D map yields the same
/// result as [`rasterize`].
pub fn rasterize_3d(map: &MultiOrderMap, order: u32) -> LocalizationResult<Raster> {
    Ok(rasterize_nested(map, order, true)?.into_ring())
}

/// Raster in NESTED order. Distance columns are filled only when
/// `with_distance` is set and the map is 3D.
pub fn rasterize_nested(
    map: &MultiOrderMap,
    order: u32,
    with_distance: bool,
) -> LocalizationResult<Raster> {
    if order > MAX_RASTER_ORDER {
        return Err(LocalizationError::unsupported_resolution(
            order,
            format!("flat rasters are limited to order {}", MAX_RASTER_ORDER),
        ));
    }

    let n = npix(order) as usize;
    let fill = ChunkFill::new(map, order);
    let mut prob = vec![0.0; n];

    let distance = match map.distance().filter(|_| with_distance) {
        None => {
            prob.par_chunks_mut(CHUNK_CELLS)
                .enumerate()
                .for_each(|(k, p)| fill.run(k * CHUNK_CELLS, p, None));
            None
        }
        Some(_) => {
            let mut distmu = vec![f64::NAN; n];
            let mut distsigma = vec![f64::NAN; n];
            let mut distnorm = vec![f64::NAN; n];
            prob.par_chunks_mut(CHUNK_CELLS)
                .zip(distmu.par_chunks_mut(CHUNK_CELLS))
                .zip(distsigma.par_chunks_mut(CHUNK_CELLS))
                .zip(distnorm.par_chunks_mut(CHUNK_CELLS))
                .enumerate()
                .for_each(|(k, (((p, mu), sigma), norm))| {
                    fill.run(k * CHUNK_CELLS, p, Some([mu, sigma, norm]))
                });
            Some(DistanceRaster {
                distmu,
                distsigma,
                distnorm,
            })
        }
    };

    log::debug!(
        "rasterized {} tiles to order {} ({} cells, 3d={})",
        map.len(),
        order,
        n,
        distance.is_some()
    );

    Ok(Raster {
        order,
        ordering: PixelOrdering::Nested,
        prob,
        distance,
    })
}

/// Fills one contiguous block of nested cells from the sky-sorted tiles that
/// intersect it. Blocks are disjoint, so they can run in parallel.
struct ChunkFill<'a> {
    map: &'a MultiOrderMap,
    order: u32,
    /// Finest-range end of each tile in sky order; non-decreasing.
    ends: Vec<u64>,
}

impl<'a> ChunkFill<'a> {
    fn new(map: &'a MultiOrderMap, order: u32) -> Self {
        let ends = map
            .sorted_rows()
            .iter()
            .map(|&row| map.tiles()[row].finest_range().end)
            .collect();
        Self { map, order, ends }
    }

    fn run(&self, first_cell: usize, prob: &mut [f64], mut distance: Option<[&mut [f64]; 3]>) {
        let cell_shift = 2 * (skymap_healpix::MAX_ORDER - self.order);
        let cells = first_cell as u64..(first_cell + prob.len()) as u64;
        let block_start = cells.start << cell_shift;
        let block_end = cells.end << cell_shift;

        let tiles = self.map.tiles();
        let density = self.map.probdensity();
        let columns = self.map.distance();
        let sorted = self.map.sorted_rows();

        // Area weight reaching each aggregated cell, for normalizing distance.
        let mut weights: Vec<f64> = Vec::new();

        let first = self.ends.partition_point(|&end| end <= block_start);
        for &row in &sorted[first..] {
            let tile = tiles[row];
            if tile.finest_range().start >= block_end {
                break;
            }
            let stats = columns.map(|c| [c.distmu[row], c.distsigma[row], c.distnorm[row]]);

            if tile.order() <= self.order {
                let shift = 2 * (self.order - tile.order());
                let lo = (tile.ipix() << shift).max(cells.start);
                let hi = ((tile.ipix() + 1) << shift).min(cells.end);
                let local = (lo - cells.start) as usize..(hi - cells.start) as usize;
                prob[local.clone()].fill(density[row]);
                if let (Some(out), Some(values)) = (distance.as_mut(), stats) {
                    for (column, value) in out.iter_mut().zip(values) {
                        column[local.clone()].fill(value);
                    }
                }
            } else {
                let depth = tile.order() - self.order;
                let weight = 0.25f64.powi(depth as i32);
                let cell = ((tile.ipix() >> (2 * depth)) - cells.start) as usize;
                prob[cell] += density[row] * weight;
                if let (Some(out), Some(values)) = (distance.as_mut(), stats) {
                    if weights.is_empty() {
                        weights = vec![0.0; prob.len()];
                    }
                    if weights[cell] == 0.0 {
                        for column in out.iter_mut() {
                            column[cell] = 0.0;
                        }
                    }
                    weights[cell] += weight;
                    for (column, value) in out.iter_mut().zip(values) {
                        column[cell] += value * weight;
                    }
                }
            }
        }

        if let Some(out) = distance.as_mut() {
            for (cell, &w) in weights.iter().enumerate() {
                if w > 0.0 {
                    for column in out.iter_mut() {
                        column[cell] /= w;
                    }
                }
            }
        }
    }
}
