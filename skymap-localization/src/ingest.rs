//! CSV ingestion of UNIQ tables, and [`read_skymap`] which picks CSV or FITS
//! by file name.
//!
//! The first non-comment line names the columns; `UNIQ` and `PROBDENSITY` are
//! required, `DISTMU`, `DISTSIGMA` and `DISTNORM` optional. Column names are
//! matched case-insensitively and may appear in any order. Lines starting with
//! `#` and blank lines are skipped. An empty distance field means "no value"
//! for that row.
//!
//! Ingestion is all-or-nothing: any bad line rejects the whole table.
//! Files ending in `.gz` are decompressed while reading.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::errors::{LocalizationError, LocalizationResult};
use crate::fits::read_skymap_fits;
use crate::map::{
    MultiOrderMap, RawRow, COLUMN_DISTMU, COLUMN_DISTNORM, COLUMN_DISTSIGMA, COLUMN_PROBDENSITY,
    COLUMN_UNIQ,
};

struct ColumnIndices {
    uniq: usize,
    probdensity: usize,
    distmu: Option<usize>,
    distsigma: Option<usize>,
    distnorm: Option<usize>,
}

impl ColumnIndices {
    fn from_header(line_no: usize, header: &str) -> LocalizationResult<Self> {
        let col_map: HashMap<String, usize> = header
            .trim()
            .split(',')
            .enumerate()
            .map(|(idx, col)| (col.trim().to_ascii_uppercase(), idx))
            .collect();
        let require = |name: &str| {
            col_map
                .get(name)
                .copied()
                .ok_or_else(|| LocalizationError::parse(line_no, format!("missing column {}", name)))
        };
        Ok(Self {
            uniq: require(COLUMN_UNIQ)?,
            probdensity: require(COLUMN_PROBDENSITY)?,
            distmu: col_map.get(COLUMN_DISTMU).copied(),
            distsigma: col_map.get(COLUMN_DISTSIGMA).copied(),
            distnorm: col_map.get(COLUMN_DISTNORM).copied(),
        })
    }

    fn parse_row(&self, line_no: usize, line: &str) -> LocalizationResult<RawRow> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        let field = |idx: usize| -> LocalizationResult<&str> {
            fields.get(idx).copied().ok_or_else(|| {
                LocalizationError::parse(
                    line_no,
                    format!("expected at least {} fields, found {}", idx + 1, fields.len()),
                )
            })
        };
        let optional = |idx: Option<usize>, name: &str| -> LocalizationResult<Option<f64>> {
            match idx.map(field).transpose()? {
                None | Some("") => Ok(None),
                Some(v) => v.parse().map(Some).map_err(|_| {
                    LocalizationError::parse(line_no, format!("invalid {} value {:?}", name, v))
                }),
            }
        };

        let uniq_text = field(self.uniq)?;
        let uniq = uniq_text.parse::<u64>().map_err(|_| {
            LocalizationError::parse(line_no, format!("invalid UNIQ value {:?}", uniq_text))
        })?;
        let density_text = field(self.probdensity)?;
        let probdensity = density_text.parse::<f64>().map_err(|_| {
            LocalizationError::parse(
                line_no,
                format!("invalid PROBDENSITY value {:?}", density_text),
            )
        })?;

        Ok(RawRow {
            uniq,
            probdensity,
            distmu: optional(self.distmu, COLUMN_DISTMU)?,
            distsigma: optional(self.distsigma, COLUMN_DISTSIGMA)?,
            distnorm: optional(self.distnorm, COLUMN_DISTNORM)?,
        })
    }
}

/// Parses a UNIQ table from CSV text and validates it as a map.
pub fn parse_skymap_csv<R: BufRead>(reader: R) -> LocalizationResult<MultiOrderMap> {
    let mut columns: Option<ColumnIndices> = None;
    let mut rows = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|err| LocalizationError::io(format!("line {}", line_no), err))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match &columns {
            None => columns = Some(ColumnIndices::from_header(line_no, trimmed)?),
            Some(cols) => rows.push(cols.parse_row(line_no, trimmed)?),
        }
    }

    if columns.is_none() {
        return Err(LocalizationError::parse(0, "no header line"));
    }
    let map = MultiOrderMap::from_rows(rows)?;
    log::info!(
        "parsed skymap table: {} tiles, orders {}..={}, 3d={}",
        map.len(),
        map.min_order(),
        map.max_order(),
        map.is_3d()
    );
    Ok(map)
}

pub fn read_skymap_csv(path: impl AsRef<Path>) -> LocalizationResult<MultiOrderMap> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|err| LocalizationError::io(format!("opening {:?}", path), err))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        parse_skymap_csv(BufReader::new(GzDecoder::new(BufReader::new(file))))
    } else {
        parse_skymap_csv(BufReader::new(file))
    }
}

/// Reads a map from disk, choosing the format by file name: `.fits`, `.fit`
/// and `.fts` (optionally followed by `.gz`) are FITS binary tables,
/// anything else is CSV.
pub fn read_skymap(path: impl AsRef<Path>) -> LocalizationResult<MultiOrderMap> {
    let path = path.as_ref();
    if is_fits_path(path) {
        read_skymap_fits(path)
    } else {
        read_skymap_csv(path)
    }
}

fn is_fits_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    [".fits", ".fit", ".fts"].iter().any(|ext| name.ends_with(ext))
}

/// Writes a map as CSV, with distance columns when it is 3D.
pub fn write_skymap_csv<W: Write>(map: &MultiOrderMap, writer: W) -> std::io::Result<()> {
    let mut out = BufWriter::new(writer);
    let table = map.as_table();
    writeln!(out, "{}", table.column_names().join(","))?;
    for row in 0..table.len() {
        write!(out, "{},{:e}", table.uniq[row], table.probdensity[row])?;
        if let Some(d) = &table.distance {
            write!(
                out,
                ",{:e},{:e},{:e}",
                d.distmu[row], d.distsigma[row], d.distnorm[row]
            )?;
        }
        writeln!(out)?;
    }
    out.flush()
}
