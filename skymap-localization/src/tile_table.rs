//! Memory-mapped tables of materialized tiles.
//!
//! A tile table holds the output of one [`materialize`](crate::materialize::materialize)
//! call and answers overlap queries without loading the file. Layout:
//!
//! 1. **Header** (64 bytes): magic `SKYT`, version, order, record count,
//!    localization UUID
//! 2. **Records** (`count × 16` bytes): [`TileRecord`] sorted by `uniq`
//!
//! All integers are little-endian. Since every record has the same order,
//! sorting by `uniq` is sorting by nested index, and the finest-level range of
//! each record is disjoint from and after the previous one.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapMut};
use skymap_healpix::constants::MAX_ORDER;
use skymap_healpix::{pixel_area_sr, Tile};

use crate::materialize::SpatialTile;
use crate::record::LocalizationId;

const TABLE_MAGIC: &[u8; 4] = b"SKYT";
const TABLE_VERSION: u32 = 1;
const HEADER_SIZE: usize = 64;
const RECORD_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct TileTableHeader {
    pub order: u32,
    pub count: u64,
    pub localization_id: LocalizationId,
}

impl fmt::Display for TileTableHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Localization: {}", self.localization_id)?;
        writeln!(f, "HEALPix order: {}", self.order)?;
        writeln!(f, "nside: {}", 1u64 << self.order)?;
        write!(f, "Tiles: {}", self.count)
    }
}

/// One stored tile (16 bytes, `repr(C)`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRecord {
    pub uniq: u64,
    pub probdensity: f64,
}

const _: () = assert!(std::mem::size_of::<TileRecord>() == RECORD_SIZE);

impl TileRecord {
    /// Decoded tile; always `Some` for records read from a [`TileTable`].
    pub fn tile(&self) -> Option<Tile> {
        Tile::from_uniq(self.uniq).ok()
    }
}

pub struct TileTable {
    mmap: Mmap,
    header: TileTableHeader,
}

impl TileTable {
    /// Writes materialized tiles to `path`.
    ///
    /// Tiles must share one order and one localization; they are stored in
    /// `uniq` order regardless of input order.
    pub fn write(path: impl AsRef<Path>, tiles: &[SpatialTile]) -> Result<TileTableHeader> {
        let path = path.as_ref();
        let Some(first) = tiles.first() else {
            bail!("Refusing to write an empty tile table: {:?}", path);
        };
        let order = first.order();
        let localization_id = first.localization_id;
        if let Some(other) = tiles
            .iter()
            .find(|t| t.order() != order || t.localization_id != localization_id)
        {
            bail!(
                "Mixed tiles: expected order {} of {}, found order {} of {}",
                order,
                localization_id,
                other.order(),
                other.localization_id
            );
        }

        let mut records: Vec<TileRecord> = tiles
            .iter()
            .map(|t| TileRecord {
                uniq: t.uniq(),
                probdensity: t.probdensity,
            })
            .collect();
        records.sort_unstable_by_key(|r| r.uniq);
        if records.windows(2).any(|w| w[0].uniq == w[1].uniq) {
            bail!("Duplicate tiles in materialized output");
        }

        let header = TileTableHeader {
            order,
            count: records.len() as u64,
            localization_id,
        };
        let size = HEADER_SIZE + records.len() * RECORD_SIZE;
        let file = create_output_file(path, size)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("Failed to memory-map tile table: {:?}", path))?;

        write_header(&mut mmap, &header);
        for (i, record) in records.iter().enumerate() {
            let at = HEADER_SIZE + i * RECORD_SIZE;
            LittleEndian::write_u64(&mut mmap[at..at + 8], record.uniq);
            LittleEndian::write_f64(&mut mmap[at + 8..at + 16], record.probdensity);
        }
        mmap.flush()
            .with_context(|| format!("Failed to flush tile table: {:?}", path))?;

        log::info!("wrote {} tiles at order {} to {:?}", header.count, order, path);
        Ok(header)
    }

    /// Opens and validates a tile table.
    ///
    /// # Errors
    /// If the file cannot be mapped, is truncated, has a bad header, or holds
    /// records that are unsorted or not at the header's order.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open tile table: {:?}", path))?;
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map tile table: {:?}", path))?;

        if mmap.len() < HEADER_SIZE {
            bail!("Tile table too small: {} bytes", mmap.len());
        }
        let header = parse_header(&mmap)?;

        let capacity = ((mmap.len() - HEADER_SIZE) / RECORD_SIZE) as u64;
        if header.count > capacity {
            bail!(
                "Tile table too small for {} records: {} bytes hold at most {}",
                header.count,
                mmap.len(),
                capacity
            );
        }
        if !(mmap[HEADER_SIZE..].as_ptr() as usize).is_multiple_of(std::mem::align_of::<TileRecord>()) {
            bail!("Tile table records are misaligned");
        }

        let table = Self { mmap, header };
        table.validate_records()?;
        log::debug!("opened tile table {:?}: {} tiles", path, table.header.count);
        Ok(table)
    }

    pub fn header(&self) -> &TileTableHeader {
        &self.header
    }

    pub fn order(&self) -> u32 {
        self.header.order
    }

    pub fn len(&self) -> usize {
        self.header.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Zero-copy view of all records.
    pub fn records(&self) -> &[TileRecord] {
        let bytes = &self.mmap[HEADER_SIZE..HEADER_SIZE + self.len() * RECORD_SIZE];
        // Length and alignment checked in `open`.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const TileRecord, self.len()) }
    }

    /// Density of the stored tile containing `tile`, if any. Tiles coarser
    /// than the table's order never match.
    pub fn density_of(&self, tile: Tile) -> Option<f64> {
        let ancestor = tile.ancestor(self.order()).ok()?;
        let records = self.records();
        records
            .binary_search_by_key(&ancestor.uniq(), |r| r.uniq)
            .ok()
            .map(|i| records[i].probdensity)
    }

    /// Records intersecting a footprint given as tiles of any order, in
    /// `uniq` order and without repeats.
    pub fn overlapping(&self, footprint: &[Tile]) -> Vec<TileRecord> {
        let mut out = Vec::new();
        self.for_each_overlap(footprint, |record, _| out.push(*record));
        out
    }

    /// Probability inside a footprint: each stored tile's density times the
    /// area of its intersection with the footprint.
    pub fn probability_within(&self, footprint: &[Tile]) -> f64 {
        let finest_area = pixel_area_sr(MAX_ORDER);
        let mut total = 0.0;
        self.for_each_overlap(footprint, |record, cells| {
            total += record.probdensity * cells as f64 * finest_area;
        });
        total
    }

    /// Calls `visit` once per overlapping record with the number of
    /// order-29 cells it shares with the footprint.
    fn for_each_overlap(&self, footprint: &[Tile], mut visit: impl FnMut(&TileRecord, u64)) {
        let ranges = merge_ranges(footprint);
        let records = self.records();
        let shift = 2 * (MAX_ORDER - self.order());
        let record_range = |r: &TileRecord| {
            let ipix = r.uniq - (4u64 << (2 * self.order()));
            (ipix << shift)..((ipix + 1) << shift)
        };

        let mut pending: Option<(usize, u64)> = None;
        for range in ranges {
            let first = records.partition_point(|r| record_range(r).end <= range.start);
            for (i, record) in records.iter().enumerate().skip(first) {
                let span = record_range(record);
                if span.start >= range.end {
                    break;
                }
                let shared = span.end.min(range.end) - span.start.max(range.start);
                pending = match pending {
                    Some((j, cells)) if j == i => Some((j, cells + shared)),
                    Some((j, cells)) => {
                        visit(&records[j], cells);
                        Some((i, shared))
                    }
                    None => Some((i, shared)),
                };
            }
        }
        if let Some((j, cells)) = pending {
            visit(&records[j], cells);
        }
    }

    fn validate_records(&self) -> Result<()> {
        let lo = 4u64 << (2 * self.order());
        let hi = 16u64 << (2 * self.order());
        let records = self.records();
        if let Some(r) = records.iter().find(|r| r.uniq < lo || r.uniq >= hi) {
            bail!(
                "Tile {} is not at the table order {}",
                r.uniq,
                self.order()
            );
        }
        if records.windows(2).any(|w| w[0].uniq >= w[1].uniq) {
            bail!("Tile table records are not strictly sorted");
        }
        Ok(())
    }
}

/// Sorted, disjoint order-29 ranges covering the union of `tiles`.
fn merge_ranges(tiles: &[Tile]) -> Vec<Range<u64>> {
    let mut ranges: Vec<Range<u64>> = tiles.iter().map(Tile::finest_range).collect();
    ranges.sort_unstable_by_key(|r| r.start);
    let mut merged: Vec<Range<u64>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

fn create_output_file(path: &Path, size: usize) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to create tile table: {:?}", path))?;
    file.set_len(size as u64)?;
    Ok(file)
}

fn write_header(mmap: &mut MmapMut, header: &TileTableHeader) {
    mmap[0..4].copy_from_slice(TABLE_MAGIC);
    LittleEndian::write_u32(&mut mmap[4..8], TABLE_VERSION);
    LittleEndian::write_u32(&mut mmap[8..12], header.order);
    LittleEndian::write_u32(&mut mmap[12..16], 0);
    LittleEndian::write_u64(&mut mmap[16..24], header.count);
    mmap[24..40].copy_from_slice(header.localization_id.as_bytes());
    mmap[40..HEADER_SIZE].fill(0);
}

fn parse_header(mmap: &Mmap) -> Result<TileTableHeader> {
    let bytes = &mmap[0..HEADER_SIZE];

    let magic = &bytes[0..4];
    if magic != TABLE_MAGIC {
        bail!(
            "Invalid tile table magic: expected {:?}, got {:?}",
            TABLE_MAGIC,
            magic
        );
    }

    let version = LittleEndian::read_u32(&bytes[4..8]);
    if version != TABLE_VERSION {
        bail!(
            "Unsupported tile table version: expected {}, got {}",
            TABLE_VERSION,
            version
        );
    }

    let order = LittleEndian::read_u32(&bytes[8..12]);
    if order > MAX_ORDER {
        bail!("Tile table order {} exceeds maximum {}", order, MAX_ORDER);
    }
    let count = LittleEndian::read_u64(&bytes[16..24]);
    let id: [u8; 16] = bytes[24..40].try_into()?;

    Ok(TileTableHeader {
        order,
        count,
        localization_id: LocalizationId::from_bytes(id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MultiOrderMap;
    use crate::materialize::materialize;
    use skymap_healpix::encode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<TileRecord>(), 16);
        assert_eq!(std::mem::align_of::<TileRecord>(), 8);
    }

    fn sample_table(order: u32) -> (NamedTempFile, MultiOrderMap, LocalizationId) {
        let mut uniq: Vec<u64> = (0..16).map(|p| encode(2, p).unwrap()).collect();
        let mut density: Vec<f64> = (0..16).map(|p| 0.01 * (p + 1) as f64).collect();
        uniq.extend(5..16);
        density.extend(std::iter::repeat(0.07).take(11));
        let map = MultiOrderMap::new(uniq, density, None).unwrap();
        let id = LocalizationId::new();
        let tiles = materialize(id, &map, order).unwrap();
        let file = NamedTempFile::new().unwrap();
        TileTable::write(file.path(), &tiles).unwrap();
        (file, map, id)
    }

    #[test]
    fn test_open_rejects_oversized_count() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(TABLE_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], TABLE_VERSION);
        LittleEndian::write_u64(&mut header[16..24], 1 << 60);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header).unwrap();
        file.write_all(&[0u8; RECORD_SIZE]).unwrap();
        file.flush().unwrap();

        let msg = TileTable::open(file.path()).err().expect("expected error").to_string();
        assert!(msg.contains("too small"), "unexpected error: {}", msg);

        LittleEndian::write_u64(&mut header[16..24], u64::MAX);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header).unwrap();
        file.flush().unwrap();
        assert!(TileTable::open(file.path()).is_err());
    }

    #[test]
    fn test_write_then_open() {
        let (file, _, id) = sample_table(2);
        let table = TileTable::open(file.path()).unwrap();
        assert_eq!(table.order(), 2);
        assert_eq!(table.len(), 192);
        assert_eq!(table.header().localization_id, id);
        assert!(table.records().windows(2).all(|w| w[0].uniq < w[1].uniq));
        assert!(table.header().to_string().contains("Tiles: 192"));
    }

    #[test]
    fn test_density_lookup() {
        let (file, _, _) = sample_table(2);
        let table = TileTable::open(file.path()).unwrap();
        assert_eq!(table.density_of(Tile::new(2, 3).unwrap()), Some(0.04));
        // A finer tile resolves to its ancestor.
        assert_eq!(table.density_of(Tile::new(5, 3 * 64 + 9).unwrap()), Some(0.04));
        assert_eq!(table.density_of(Tile::new(2, 100).unwrap()), Some(0.07));
        assert_eq!(table.density_of(Tile::new(1, 0).unwrap()), None);
    }

    #[test]
    fn test_full_sky_footprint_holds_all_mass() {
        let (file, map, _) = sample_table(3);
        let table = TileTable::open(file.path()).unwrap();
        let sky: Vec<Tile> = (0..12).map(|f| Tile::new(0, f).unwrap()).collect();
        assert_eq!(table.overlapping(&sky).len(), table.len());
        let p = table.probability_within(&sky);
        assert!((p - map.total_probability()).abs() < 1e-9);
    }

    #[test]
    fn test_partial_footprint() {
        let (file, _, _) = sample_table(1);
        let table = TileTable::open(file.path()).unwrap();
        // Two order-3 tiles inside order-1 pixel 0, one inside pixel 1.
        let footprint = vec![
            Tile::new(3, 0).unwrap(),
            Tile::new(3, 1).unwrap(),
            Tile::new(3, 16).unwrap(),
        ];
        let hits = table.overlapping(&footprint);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].uniq, encode(1, 0).unwrap());
        assert_eq!(hits[1].uniq, encode(1, 1).unwrap());

        let cell = pixel_area_sr(3);
        let expected = 2.0 * cell * hits[0].probdensity + cell * hits[1].probdensity;
        assert!((table.probability_within(&footprint) - expected).abs() < 1e-15);
    }

    #[test]
    fn test_merge_ranges() {
        let tiles = vec![
            Tile::new(1, 0).unwrap(),
            Tile::new(2, 1).unwrap(),
            Tile::new(1, 1).unwrap(),
            Tile::new(1, 3).unwrap(),
        ];
        let merged = merge_ranges(&tiles);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], Tile::new(1, 0).unwrap().finest_range().start..Tile::new(1, 1).unwrap().finest_range().end);
    }

    #[test]
    fn test_open_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();
        file.flush().unwrap();
        let msg = TileTable::open(file.path()).err().expect("expected error").to_string();
        assert!(msg.contains("magic"), "unexpected error: {}", msg);
    }

    #[test]
    fn test_open_truncated() {
        let (file, _, _) = sample_table(1);
        let bytes = std::fs::read(file.path()).unwrap();
        let mut short = NamedTempFile::new().unwrap();
        short.write_all(&bytes[..bytes.len() - 8]).unwrap();
        short.flush().unwrap();
        let msg = TileTable::open(short.path()).err().expect("expected error").to_string();
        assert!(msg.contains("too small"), "unexpected error: {}", msg);
    }

    #[test]
    fn test_write_rejects_mixed_orders() {
        let map = MultiOrderMap::new((4..16).collect(), vec![0.1; 12], None).unwrap();
        let id = LocalizationId::new();
        let mut tiles = materialize(id, &map, 0).unwrap();
        tiles.extend(materialize(id, &map, 1).unwrap());
        let file = NamedTempFile::new().unwrap();
        assert!(TileTable::write(file.path(), &tiles).is_err());
    }
}
