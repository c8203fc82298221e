//! The multi-order map: the canonical, immutable form of a sky localization.
//!
//! A map is a set of non-overlapping HEALPix tiles of mixed order, each with a
//! probability density (per steradian) and, for 3D maps, the distance ansatz
//! parameters `(distmu, distsigma, distnorm)`. Rows keep their ingestion
//! order; a sky-sorted index is built once at construction and shared by the
//! rasterizer, the materializer and point lookups.
//!
//! Construction is all-or-nothing: any violation returns
//! [`LocalizationError::MalformedMap`] and no map is created.

use serde::{Deserialize, Serialize};
use skymap_healpix::constants::{MAX_ORDER, SQDEG_PER_SR};
use skymap_healpix::{ang2pix_nest, Tile};

use crate::errors::{LocalizationError, LocalizationResult};

/// Column names of the multi-order table format.
pub const COLUMN_UNIQ: &str = "UNIQ";
pub const COLUMN_PROBDENSITY: &str = "PROBDENSITY";
pub const COLUMN_DISTMU: &str = "DISTMU";
pub const COLUMN_DISTSIGMA: &str = "DISTSIGMA";
pub const COLUMN_DISTNORM: &str = "DISTNORM";

/// Distance ansatz parameters of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    pub mu: f64,
    pub sigma: f64,
    pub norm: f64,
}

/// The three distance columns of a 3D map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceColumns {
    pub distmu: Vec<f64>,
    pub distsigma: Vec<f64>,
    pub distnorm: Vec<f64>,
}

impl DistanceColumns {
    fn get(&self, i: usize) -> DistanceStats {
        DistanceStats {
            mu: self.distmu[i],
            sigma: self.distsigma[i],
            norm: self.distnorm[i],
        }
    }
}

/// One row of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEntry {
    pub tile: Tile,
    pub probdensity: f64,
    pub distance: Option<DistanceStats>,
}

/// One row as it arrives from ingestion, with each distance value optional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawRow {
    pub uniq: u64,
    pub probdensity: f64,
    pub distmu: Option<f64>,
    pub distsigma: Option<f64>,
    pub distnorm: Option<f64>,
}

/// Column view of a map, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkymapTable {
    pub uniq: Vec<u64>,
    pub probdensity: Vec<f64>,
    pub distance: Option<DistanceColumns>,
}

impl SkymapTable {
    pub fn len(&self) -> usize {
        self.uniq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniq.is_empty()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        let mut names = vec![COLUMN_UNIQ, COLUMN_PROBDENSITY];
        if self.distance.is_some() {
            names.extend([COLUMN_DISTMU, COLUMN_DISTSIGMA, COLUMN_DISTNORM]);
        }
        names
    }
}

#[derive(Debug, Clone)]
pub struct MultiOrderMap {
    tiles: Vec<Tile>,
    probdensity: Vec<f64>,
    distance: Option<DistanceColumns>,
    /// Row indices sorted by sky position (see `Ord for Tile`).
    sorted: Vec<usize>,
}

impl MultiOrderMap {
    /// Builds a map from parallel columns.
    ///
    /// # Errors
    /// [`LocalizationError::MalformedMap`] when the map is empty, column
    /// lengths differ, a UNIQ value is invalid, a density is negative or not
    /// finite, or two tiles are equal or overlap.
    pub fn new(
        uniq: Vec<u64>,
        probdensity: Vec<f64>,
        distance: Option<DistanceColumns>,
    ) -> LocalizationResult<Self> {
        check_lengths(&uniq, &probdensity, distance.as_ref())?;
        if uniq.is_empty() {
            return Err(LocalizationError::malformed("map has no tiles"));
        }

        let tiles = uniq
            .iter()
            .enumerate()
            .map(|(row, &u)| {
                Tile::from_uniq(u)
                    .map_err(|err| LocalizationError::malformed(format!("row {}: {}", row, err)))
            })
            .collect::<LocalizationResult<Vec<_>>>()?;

        if let Some(row) = probdensity.iter().position(|d| !d.is_finite() || *d < 0.0) {
            return Err(LocalizationError::malformed(format!(
                "row {}: probability density {} is negative or not finite",
                row, probdensity[row]
            )));
        }

        let sorted = sorted_without_overlap(&tiles)?;

        log::debug!(
            "built multi-order map: {} tiles, 3d={}",
            tiles.len(),
            distance.is_some()
        );

        Ok(Self {
            tiles,
            probdensity,
            distance,
            sorted,
        })
    }

    /// Builds a map from the five table columns, each distance column optional.
    ///
    /// The map is 3D only if all three distance columns are given; otherwise
    /// the partial distance data is dropped and the map is 2D.
    pub fn from_optional_columns(
        uniq: Vec<u64>,
        probdensity: Vec<f64>,
        distmu: Option<Vec<f64>>,
        distsigma: Option<Vec<f64>>,
        distnorm: Option<Vec<f64>>,
    ) -> LocalizationResult<Self> {
        let distance = match (distmu, distsigma, distnorm) {
            (Some(distmu), Some(distsigma), Some(distnorm)) => Some(DistanceColumns {
                distmu,
                distsigma,
                distnorm,
            }),
            (None, None, None) => None,
            _ => {
                log::warn!("incomplete distance columns; treating map as 2D");
                None
            }
        };
        Self::new(uniq, probdensity, distance)
    }

    /// Builds a map from ingested rows. The map is 3D only if every row
    /// carries all three distance values.
    pub fn from_rows(rows: impl IntoIterator<Item = RawRow>) -> LocalizationResult<Self> {
        let rows: Vec<RawRow> = rows.into_iter().collect();
        let uniq = rows.iter().map(|r| r.uniq).collect();
        let probdensity = rows.iter().map(|r| r.probdensity).collect();

        let complete = !rows.is_empty()
            && rows
                .iter()
                .all(|r| r.distmu.is_some() && r.distsigma.is_some() && r.distnorm.is_some());
        let distance = complete.then(|| DistanceColumns {
            distmu: rows.iter().filter_map(|r| r.distmu).collect(),
            distsigma: rows.iter().filter_map(|r| r.distsigma).collect(),
            distnorm: rows.iter().filter_map(|r| r.distnorm).collect(),
        });
        if !complete && rows.iter().any(|r| r.distmu.is_some()) {
            log::warn!("distance values missing on some rows; treating map as 2D");
        }

        Self::new(uniq, probdensity, distance)
    }

    pub fn from_table(table: SkymapTable) -> LocalizationResult<Self> {
        Self::new(table.uniq, table.probdensity, table.distance)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn is_3d(&self) -> bool {
        self.distance.is_some()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn probdensity(&self) -> &[f64] {
        &self.probdensity
    }

    pub fn distance(&self) -> Option<&DistanceColumns> {
        self.distance.as_ref()
    }

    pub fn entry(&self, row: usize) -> Option<MapEntry> {
        let tile = *self.tiles.get(row)?;
        Some(MapEntry {
            tile,
            probdensity: self.probdensity[row],
            distance: self.distance.as_ref().map(|d| d.get(row)),
        })
    }

    /// Rows in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = MapEntry> + '_ {
        (0..self.len()).filter_map(move |row| self.entry(row))
    }

    /// Rows in sky order: coarser tiles before their (absent) descendants,
    /// otherwise by position along the nested curve.
    pub fn iter_sorted(&self) -> impl Iterator<Item = MapEntry> + '_ {
        self.sorted.iter().filter_map(move |&row| self.entry(row))
    }

    pub(crate) fn sorted_rows(&self) -> &[usize] {
        &self.sorted
    }

    /// Full table, with distance columns when the map is 3D.
    pub fn as_table(&self) -> SkymapTable {
        SkymapTable {
            uniq: self.tiles.iter().map(Tile::uniq).collect(),
            probdensity: self.probdensity.clone(),
            distance: self.distance.clone(),
        }
    }

    /// UNIQ and PROBDENSITY only.
    pub fn as_table_2d(&self) -> SkymapTable {
        SkymapTable {
            distance: None,
            ..self.as_table()
        }
    }

    /// The same tiles and densities without distance information.
    pub fn to_2d(&self) -> Self {
        Self {
            distance: None,
            ..self.clone()
        }
    }

    pub fn min_order(&self) -> u32 {
        self.tiles.iter().map(Tile::order).min().unwrap_or(0)
    }

    pub fn max_order(&self) -> u32 {
        self.tiles.iter().map(Tile::order).max().unwrap_or(0)
    }

    /// Total probability `Σ density · solid angle`. Nominally 1; ingestion
    /// does not renormalize.
    pub fn total_probability(&self) -> f64 {
        self.tiles
            .iter()
            .zip(&self.probdensity)
            .map(|(tile, density)| density * tile.solid_angle())
            .sum()
    }

    /// The row whose tile contains the direction, if any.
    pub fn row_at(&self, ra_deg: f64, dec_deg: f64) -> Option<usize> {
        let ipix = ang2pix_nest(MAX_ORDER, ra_deg, dec_deg);
        let after = self
            .sorted
            .partition_point(|&row| self.tiles[row].finest_range().start <= ipix);
        let row = *self.sorted.get(after.checked_sub(1)?)?;
        self.tiles[row].finest_range().contains(&ipix).then_some(row)
    }

    /// Probability density at a direction; `None` outside the map's coverage.
    pub fn probdensity_at(&self, ra_deg: f64, dec_deg: f64) -> Option<f64> {
        self.row_at(ra_deg, dec_deg).map(|row| self.probdensity[row])
    }

    /// Area of the smallest region holding `level` of the probability, in
    /// square degrees.
    ///
    /// Tiles are taken greedily by decreasing density; the tile that crosses
    /// the threshold contributes the fraction of its area needed to reach it.
    /// Probabilities are normalized by [`total_probability`](Self::total_probability).
    pub fn credible_area_deg2(&self, level: f64) -> f64 {
        let level = level.clamp(0.0, 1.0);
        let total = self.total_probability();
        if total <= 0.0 || level == 0.0 {
            return 0.0;
        }

        let mut rows: Vec<usize> = (0..self.len()).collect();
        rows.sort_by(|&a, &b| self.probdensity[b].total_cmp(&self.probdensity[a]));

        let target = level * total;
        let mut cumulative = 0.0;
        let mut area_sr = 0.0;
        for row in rows {
            let tile_area = self.tiles[row].solid_angle();
            let mass = self.probdensity[row] * tile_area;
            if cumulative + mass >= target {
                if mass > 0.0 {
                    area_sr += tile_area * (target - cumulative) / mass;
                }
                return area_sr * SQDEG_PER_SR;
            }
            cumulative += mass;
            area_sr += tile_area;
        }
        area_sr * SQDEG_PER_SR
    }
}

fn check_lengths(
    uniq: &[u64],
    probdensity: &[f64],
    distance: Option<&DistanceColumns>,
) -> LocalizationResult<()> {
    let n = uniq.len();
    if probdensity.len() != n {
        return Err(LocalizationError::malformed(format!(
            "{} tile ids but {} probability densities",
            n,
            probdensity.len()
        )));
    }
    if let Some(d) = distance {
        for (name, len) in [
            (COLUMN_DISTMU, d.distmu.len()),
            (COLUMN_DISTSIGMA, d.distsigma.len()),
            (COLUMN_DISTNORM, d.distnorm.len()),
        ] {
            if len != n {
                return Err(LocalizationError::malformed(format!(
                    "{} tile ids but {} {} values",
                    n, len, name
                )));
            }
        }
    }
    Ok(())
}

/// Sorts rows by sky position and rejects duplicates and overlaps.
///
/// After sorting, tile `k` overlaps some earlier tile iff its finest-range
/// start falls below the largest end seen so far.
fn sorted_without_overlap(tiles: &[Tile]) -> LocalizationResult<Vec<usize>> {
    let mut sorted: Vec<usize> = (0..tiles.len()).collect();
    sorted.sort_unstable_by(|&a, &b| tiles[a].cmp(&tiles[b]));

    let mut cover: Option<(usize, u64)> = None;
    for &row in &sorted {
        let range = tiles[row].finest_range();
        if let Some((prev, end)) = cover {
            if range.start < end {
                let message = if tiles[prev] == tiles[row] {
                    format!(
                        "duplicate tile id {} at rows {} and {}",
                        tiles[row].uniq(),
                        prev,
                        row
                    )
                } else {
                    format!(
                        "tile {} (row {}) overlaps tile {} (row {})",
                        tiles[row].uniq(),
                        row,
                        tiles[prev].uniq(),
                        prev
                    )
                };
                return Err(LocalizationError::malformed(message));
            }
        }
        if cover.map_or(true, |(_, end)| range.end > end) {
            cover = Some((row, range.end));
        }
    }
    Ok(sorted)
}
