//! FITS binary-table ingestion of multi-order maps.
//!
//! A multi-order sky map file is a FITS file whose first `BINTABLE` extension
//! holds one row per tile. `UNIQ` (type `K` or `J`) and `PROBDENSITY` (type
//! `D` or `E`) are required; `DISTMU`, `DISTSIGMA` and `DISTNORM` are optional
//! and the map is 3D only when all three are present. Column names are
//! matched case-insensitively. An `ORDERING` keyword, when present, must be
//! `NUNIQ`.
//!
//! Files ending in `.gz` are decompressed while reading. The reader only
//! streams forward, so it works on compressed input without seeking.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use flate2::read::GzDecoder;

use crate::errors::{LocalizationError, LocalizationResult};
use crate::map::{
    MultiOrderMap, COLUMN_DISTMU, COLUMN_DISTNORM, COLUMN_DISTSIGMA, COLUMN_PROBDENSITY,
    COLUMN_UNIQ,
};

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl KeywordValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// Keyword cards of one header unit, in file order.
#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: Vec<(String, KeywordValue)>,
}

impl Header {
    pub fn get(&self, keyword: &str) -> Option<&KeywordValue> {
        self.cards
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v)
    }

    fn integer(&self, keyword: &str) -> LocalizationResult<i64> {
        self.get(keyword)
            .and_then(KeywordValue::as_integer)
            .ok_or_else(|| LocalizationError::fits(format!("missing integer keyword {}", keyword)))
    }

    fn size(&self, keyword: &str) -> LocalizationResult<usize> {
        let value = self.integer(keyword)?;
        usize::try_from(value)
            .map_err(|_| LocalizationError::fits(format!("{} = {} is negative", keyword, value)))
    }

    /// Bytes in this unit's data section, before padding to a block.
    fn data_len(&self) -> LocalizationResult<usize> {
        let naxis = self.size("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let bitpix = self.integer("BITPIX")?;
        let bytes_per_value = match bitpix {
            8 | 16 | 32 | 64 | -32 | -64 => bitpix.unsigned_abs() as usize / 8,
            other => return Err(LocalizationError::fits(format!("invalid BITPIX {}", other))),
        };
        let pcount = match self.get("PCOUNT") {
            Some(_) => self.size("PCOUNT")?,
            None => 0,
        };
        let gcount = match self.get("GCOUNT") {
            Some(_) => self.size("GCOUNT")?,
            None => 1,
        };

        let mut values = 1usize;
        for axis in 1..=naxis {
            values = values
                .checked_mul(self.size(&format!("NAXIS{}", axis))?)
                .ok_or_else(|| LocalizationError::fits("data size overflows"))?;
        }
        values
            .checked_add(pcount)
            .and_then(|v| v.checked_mul(gcount))
            .and_then(|v| v.checked_mul(bytes_per_value))
            .ok_or_else(|| LocalizationError::fits("data size overflows"))
    }
}

fn strip_quotes(text: &str) -> LocalizationResult<String> {
    // Inside a string value, '' stands for a single quote.
    let mut out = String::new();
    let mut chars = text[1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                return Ok(out.trim_end().to_string());
            }
        } else {
            out.push(c);
        }
    }
    Err(LocalizationError::fits(format!(
        "unterminated string value {:?}",
        text
    )))
}

fn parse_value(text: &str) -> LocalizationResult<Option<KeywordValue>> {
    let text = text.trim_start();
    if text.starts_with('\'') {
        return strip_quotes(text).map(|s| Some(KeywordValue::String(s)));
    }
    let value = text.split('/').next().unwrap_or("").trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value == "T" {
        return Ok(Some(KeywordValue::Logical(true)));
    }
    if value == "F" {
        return Ok(Some(KeywordValue::Logical(false)));
    }
    if let Ok(i) = value.parse::<i64>() {
        return Ok(Some(KeywordValue::Integer(i)));
    }
    // FITS allows a D exponent for double precision.
    if let Ok(f) = value.replace(['D', 'd'], "E").parse::<f64>() {
        return Ok(Some(KeywordValue::Real(f)));
    }
    Err(LocalizationError::fits(format!(
        "unrecognized keyword value {:?}",
        value
    )))
}

/// Reads one full block, or returns `false` at a clean end of input.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE]) -> LocalizationResult<bool> {
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let n = match reader.read(&mut block[filled..]) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(LocalizationError::io("reading FITS block", err)),
        };
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(LocalizationError::fits(format!(
                "truncated block: {} of {} bytes",
                filled, BLOCK_SIZE
            )));
        }
        filled += n;
    }
    Ok(true)
}

/// Reads header blocks up to and including the one holding `END`.
/// Returns `None` when the input ends before any header block.
pub fn read_header<R: Read>(reader: &mut R) -> LocalizationResult<Option<Header>> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut header = Header::default();
    let mut first = true;
    loop {
        if !read_block(reader, &mut block)? {
            if first {
                return Ok(None);
            }
            return Err(LocalizationError::fits("header ends without END card"));
        }
        first = false;

        for card in block.chunks_exact(CARD_SIZE) {
            if !card.is_ascii() {
                return Err(LocalizationError::fits("header card is not ASCII"));
            }
            let card = std::str::from_utf8(card)
                .map_err(|_| LocalizationError::fits("header card is not ASCII"))?;
            let keyword = card[..8].trim_end();
            if keyword == "END" {
                return Ok(Some(header));
            }
            if keyword.is_empty() || &card[8..10] != "= " {
                continue;
            }
            if let Some(value) = parse_value(&card[10..])? {
                header.cards.push((keyword.to_string(), value));
            }
        }
    }
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn skip<R: Read>(reader: &mut R, len: usize) -> LocalizationResult<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())
        .map_err(|err| LocalizationError::io("skipping FITS data", err))?;
    if skipped < len as u64 {
        return Err(LocalizationError::fits(format!(
            "data truncated: {} of {} bytes",
            skipped, len
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Int32,
    Int64,
    Float32,
    Float64,
    Other,
}

#[derive(Debug, Clone)]
struct BinaryColumn {
    repeat: usize,
    kind: ColumnType,
    offset: usize,
}

/// Splits a `TFORMn` value such as `1K` or `D` into repeat count, type code
/// and the byte size of one element.
fn parse_tform(tform: &str) -> LocalizationResult<(usize, char, usize)> {
    let tform = tform.trim();
    let digits = tform.chars().take_while(|c| c.is_ascii_digit()).count();
    let repeat = if digits == 0 {
        1
    } else {
        tform[..digits]
            .parse::<usize>()
            .map_err(|_| LocalizationError::fits(format!("invalid repeat in TFORM {:?}", tform)))?
    };
    let code = tform[digits..]
        .chars()
        .next()
        .ok_or_else(|| LocalizationError::fits(format!("missing type in TFORM {:?}", tform)))?;
    let element_size = match code {
        'L' | 'X' | 'B' | 'A' => 1,
        'I' => 2,
        'J' | 'E' => 4,
        'K' | 'D' | 'C' | 'P' => 8,
        'M' | 'Q' => 16,
        other => {
            return Err(LocalizationError::fits(format!(
                "unsupported column type {:?}",
                other
            )))
        }
    };
    // X counts bits, not bytes.
    let width = if code == 'X' {
        repeat.div_ceil(8)
    } else {
        repeat
            .checked_mul(element_size)
            .ok_or_else(|| LocalizationError::fits("column width overflows"))?
    };
    Ok((repeat, code, width))
}

/// Layout of one binary table: row width, row count, named columns.
struct BinaryTable {
    row_size: usize,
    rows: usize,
    columns: HashMap<String, BinaryColumn>,
}

impl BinaryTable {
    fn from_header(header: &Header) -> LocalizationResult<Self> {
        let row_size = header.size("NAXIS1")?;
        let rows = header.size("NAXIS2")?;
        let fields = header.size("TFIELDS")?;

        let mut columns = HashMap::new();
        let mut offset = 0usize;
        for i in 1..=fields {
            let tform = header
                .get(&format!("TFORM{}", i))
                .and_then(KeywordValue::as_string)
                .ok_or_else(|| LocalizationError::fits(format!("missing TFORM{}", i)))?;
            let (repeat, code, width) = parse_tform(tform)?;
            let kind = match code {
                'J' => ColumnType::Int32,
                'K' => ColumnType::Int64,
                'E' => ColumnType::Float32,
                'D' => ColumnType::Float64,
                _ => ColumnType::Other,
            };
            if let Some(name) = header
                .get(&format!("TTYPE{}", i))
                .and_then(KeywordValue::as_string)
            {
                columns.insert(
                    name.trim().to_ascii_uppercase(),
                    BinaryColumn {
                        repeat,
                        kind,
                        offset,
                    },
                );
            }
            offset = offset
                .checked_add(width)
                .ok_or_else(|| LocalizationError::fits("row width overflows"))?;
        }
        if offset != row_size {
            return Err(LocalizationError::fits(format!(
                "columns span {} bytes but NAXIS1 = {}",
                offset, row_size
            )));
        }

        Ok(Self {
            row_size,
            rows,
            columns,
        })
    }

    fn column(&self, name: &str) -> LocalizationResult<Option<&BinaryColumn>> {
        match self.columns.get(name) {
            Some(col) if col.repeat != 1 => Err(LocalizationError::fits(format!(
                "column {} has repeat count {}, expected 1",
                name, col.repeat
            ))),
            other => Ok(other),
        }
    }

    fn cells<'a>(&self, data: &'a [u8], col: &BinaryColumn) -> impl Iterator<Item = &'a [u8]> {
        let row_size = self.row_size;
        let offset = col.offset;
        (0..self.rows).map(move |row| &data[row * row_size + offset..])
    }

    fn read_uniq(&self, data: &[u8]) -> LocalizationResult<Vec<u64>> {
        let col = self
            .column(COLUMN_UNIQ)?
            .ok_or_else(|| LocalizationError::parse(0, format!("missing column {}", COLUMN_UNIQ)))?;
        let values: Vec<i64> = match col.kind {
            ColumnType::Int64 => self.cells(data, col).map(BigEndian::read_i64).collect(),
            ColumnType::Int32 => self
                .cells(data, col)
                .map(|cell| i64::from(BigEndian::read_i32(cell)))
                .collect(),
            _ => {
                return Err(LocalizationError::fits(format!(
                    "column {} must be an integer column",
                    COLUMN_UNIQ
                )))
            }
        };
        values
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                u64::try_from(v).map_err(|_| {
                    LocalizationError::malformed(format!("row {}: negative UNIQ {}", row, v))
                })
            })
            .collect()
    }

    fn read_float(&self, data: &[u8], name: &str) -> LocalizationResult<Option<Vec<f64>>> {
        let Some(col) = self.column(name)? else {
            return Ok(None);
        };
        let values = match col.kind {
            ColumnType::Float64 => self.cells(data, col).map(BigEndian::read_f64).collect(),
            ColumnType::Float32 => self
                .cells(data, col)
                .map(|cell| f64::from(BigEndian::read_f32(cell)))
                .collect(),
            _ => {
                return Err(LocalizationError::fits(format!(
                    "column {} must be a floating-point column",
                    name
                )))
            }
        };
        Ok(Some(values))
    }
}

/// Parses a multi-order map from the first binary table of a FITS stream.
pub fn parse_skymap_fits<R: Read>(mut reader: R) -> LocalizationResult<MultiOrderMap> {
    let primary = read_header(&mut reader)?
        .ok_or_else(|| LocalizationError::fits("empty file"))?;
    if primary.get("SIMPLE").and_then(KeywordValue::as_logical) != Some(true) {
        return Err(LocalizationError::fits("not a FITS file (SIMPLE = T missing)"));
    }
    skip(&mut reader, padded(primary.data_len()?))?;

    let mut extension = 1;
    let header = loop {
        let header = read_header(&mut reader)?
            .ok_or_else(|| LocalizationError::fits("no BINTABLE extension"))?;
        if header.get("XTENSION").and_then(KeywordValue::as_string) == Some("BINTABLE") {
            break header;
        }
        log::debug!("skipping FITS extension {}", extension);
        skip(&mut reader, padded(header.data_len()?))?;
        extension += 1;
    };

    if let Some(ordering) = header.get("ORDERING").and_then(KeywordValue::as_string) {
        if !ordering.eq_ignore_ascii_case("NUNIQ") {
            return Err(LocalizationError::fits(format!(
                "unsupported ORDERING {:?}, expected NUNIQ",
                ordering
            )));
        }
    }

    let table = BinaryTable::from_header(&header)?;
    let len = table
        .row_size
        .checked_mul(table.rows)
        .ok_or_else(|| LocalizationError::fits("table size overflows"))?;
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut data)
        .map_err(|err| LocalizationError::io("reading binary table", err))?;
    if data.len() < len {
        return Err(LocalizationError::fits(format!(
            "table truncated: {} of {} bytes",
            data.len(),
            len
        )));
    }

    let uniq = table.read_uniq(&data)?;
    let probdensity = table
        .read_float(&data, COLUMN_PROBDENSITY)?
        .ok_or_else(|| {
            LocalizationError::parse(0, format!("missing column {}", COLUMN_PROBDENSITY))
        })?;
    let map = MultiOrderMap::from_optional_columns(
        uniq,
        probdensity,
        table.read_float(&data, COLUMN_DISTMU)?,
        table.read_float(&data, COLUMN_DISTSIGMA)?,
        table.read_float(&data, COLUMN_DISTNORM)?,
    )?;
    log::info!(
        "parsed FITS skymap: {} tiles, orders {}..={}, 3d={}",
        map.len(),
        map.min_order(),
        map.max_order(),
        map.is_3d()
    );
    Ok(map)
}

pub fn read_skymap_fits(path: impl AsRef<Path>) -> LocalizationResult<MultiOrderMap> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|err| LocalizationError::io(format!("opening {:?}", path), err))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        parse_skymap_fits(GzDecoder::new(BufReader::new(file)))
    } else {
        parse_skymap_fits(BufReader::new(file))
    }
}

fn card(keyword: &str, value: &KeywordValue) -> String {
    let value = match value {
        KeywordValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        KeywordValue::Integer(i) => format!("{:>20}", i),
        KeywordValue::Real(r) => format!("{:>20E}", r),
        KeywordValue::String(s) => format!("'{:<8}'", s.replace('\'', "''")),
    };
    format!("{:<8}= {:<70}", keyword, value)
}

fn write_header<W: Write>(out: &mut W, cards: &[(&str, KeywordValue)]) -> io::Result<()> {
    let mut text = String::new();
    for (keyword, value) in cards {
        text.push_str(&card(keyword, value));
    }
    text.push_str(&format!("{:<80}", "END"));
    let len = padded(text.len());
    out.write_all(text.as_bytes())?;
    out.write_all(&vec![b' '; len - text.len()])
}

/// Writes a map as a FITS file: an empty primary unit followed by one
/// `NUNIQ` binary table, with distance columns when the map is 3D.
pub fn write_skymap_fits<W: Write>(map: &MultiOrderMap, writer: W) -> io::Result<()> {
    let mut out = BufWriter::new(writer);
    let table = map.as_table();
    let names = table.column_names();
    let row_size = 8 * names.len();

    write_header(
        &mut out,
        &[
            ("SIMPLE", KeywordValue::Logical(true)),
            ("BITPIX", KeywordValue::Integer(8)),
            ("NAXIS", KeywordValue::Integer(0)),
            ("EXTEND", KeywordValue::Logical(true)),
        ],
    )?;

    let keys: Vec<(String, String)> = (1..=names.len())
        .map(|i| (format!("TTYPE{}", i), format!("TFORM{}", i)))
        .collect();
    let mut cards = vec![
        ("XTENSION", KeywordValue::String("BINTABLE".into())),
        ("BITPIX", KeywordValue::Integer(8)),
        ("NAXIS", KeywordValue::Integer(2)),
        ("NAXIS1", KeywordValue::Integer(row_size as i64)),
        ("NAXIS2", KeywordValue::Integer(table.len() as i64)),
        ("PCOUNT", KeywordValue::Integer(0)),
        ("GCOUNT", KeywordValue::Integer(1)),
        ("TFIELDS", KeywordValue::Integer(names.len() as i64)),
    ];
    for (i, name) in names.iter().enumerate() {
        let form = if i == 0 { "K" } else { "D" };
        cards.push((keys[i].0.as_str(), KeywordValue::String(name.to_string())));
        cards.push((keys[i].1.as_str(), KeywordValue::String(form.into())));
    }
    cards.push(("ORDERING", KeywordValue::String("NUNIQ".into())));
    write_header(&mut out, &cards)?;

    for row in 0..table.len() {
        out.write_i64::<BigEndian>(table.uniq[row] as i64)?;
        out.write_f64::<BigEndian>(table.probdensity[row])?;
        if let Some(d) = &table.distance {
            out.write_f64::<BigEndian>(d.distmu[row])?;
            out.write_f64::<BigEndian>(d.distsigma[row])?;
            out.write_f64::<BigEndian>(d.distnorm[row])?;
        }
    }
    let data_len = row_size * table.len();
    out.write_all(&vec![0u8; padded(data_len) - data_len])?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn three_d_map() -> MultiOrderMap {
        // Face 0 split into its four order-1 children, the rest coarse.
        let mut uniq: Vec<u64> = (16..20).collect();
        uniq.extend(5..16);
        let density: Vec<f64> = (0..uniq.len()).map(|i| 0.01 * (i + 1) as f64).collect();
        let n = uniq.len();
        MultiOrderMap::from_optional_columns(
            uniq,
            density,
            Some((0..n).map(|i| 100.0 + i as f64).collect()),
            Some(vec![20.0; n]),
            Some(vec![1e-4; n]),
        )
        .unwrap()
    }

    fn fits_bytes(map: &MultiOrderMap) -> Vec<u8> {
        let mut buf = Vec::new();
        write_skymap_fits(map, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_parse_tform() {
        assert_eq!(parse_tform("K").unwrap(), (1, 'K', 8));
        assert_eq!(parse_tform("1D").unwrap(), (1, 'D', 8));
        assert_eq!(parse_tform("3E").unwrap(), (3, 'E', 12));
        assert_eq!(parse_tform("12X").unwrap(), (12, 'X', 2));
        assert!(parse_tform("").is_err());
        assert!(parse_tform("2Z").is_err());
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            parse_value(" 'BINTABLE'           / binary table").unwrap(),
            Some(KeywordValue::String("BINTABLE".into()))
        );
        assert_eq!(
            parse_value(" 'O''HARA '").unwrap(),
            Some(KeywordValue::String("O'HARA".into()))
        );
        assert_eq!(
            parse_value("                    T").unwrap(),
            Some(KeywordValue::Logical(true))
        );
        assert_eq!(
            parse_value("                   42 / rows").unwrap(),
            Some(KeywordValue::Integer(42))
        );
        assert_eq!(
            parse_value("              1.5D-3").unwrap(),
            Some(KeywordValue::Real(1.5e-3))
        );
        assert_eq!(parse_value("   / only a comment").unwrap(), None);
        assert!(parse_value(" 'unterminated").is_err());
    }

    #[test]
    fn test_written_file_is_block_aligned() {
        let buf = fits_bytes(&three_d_map());
        assert_eq!(buf.len() % BLOCK_SIZE, 0);
        assert!(buf.starts_with(b"SIMPLE  =                    T"));
    }

    #[test]
    fn test_read_3d_multi_order_table() {
        let map = three_d_map();
        let parsed = parse_skymap_fits(Cursor::new(fits_bytes(&map))).unwrap();
        assert!(parsed.is_3d());
        assert_eq!(parsed.min_order(), 0);
        assert_eq!(parsed.max_order(), 1);
        assert_eq!(parsed.as_table(), map.as_table());
    }

    #[test]
    fn test_read_2d_table_from_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let map = MultiOrderMap::new((4..16).collect(), vec![0.05; 12], None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skymap.multiorder.fits.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&fits_bytes(&map)).unwrap();
        encoder.finish().unwrap();

        let parsed = read_skymap_fits(&path).unwrap();
        assert!(!parsed.is_3d());
        assert_eq!(parsed.probdensity(), &[0.05; 12]);
    }

    /// Builds a table by hand: 32-bit UNIQ, 32-bit densities, an extra
    /// leading column and an image extension before the table.
    #[test]
    fn test_read_narrow_columns_after_image_extension() {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            &[
                ("SIMPLE", KeywordValue::Logical(true)),
                ("BITPIX", KeywordValue::Integer(8)),
                ("NAXIS", KeywordValue::Integer(0)),
            ],
        )
        .unwrap();
        write_header(
            &mut buf,
            &[
                ("XTENSION", KeywordValue::String("IMAGE".into())),
                ("BITPIX", KeywordValue::Integer(16)),
                ("NAXIS", KeywordValue::Integer(1)),
                ("NAXIS1", KeywordValue::Integer(10)),
                ("PCOUNT", KeywordValue::Integer(0)),
                ("GCOUNT", KeywordValue::Integer(1)),
            ],
        )
        .unwrap();
        buf.extend(vec![0u8; BLOCK_SIZE]);
        write_header(
            &mut buf,
            &[
                ("XTENSION", KeywordValue::String("BINTABLE".into())),
                ("BITPIX", KeywordValue::Integer(8)),
                ("NAXIS", KeywordValue::Integer(2)),
                ("NAXIS1", KeywordValue::Integer(10)),
                ("NAXIS2", KeywordValue::Integer(12)),
                ("PCOUNT", KeywordValue::Integer(0)),
                ("GCOUNT", KeywordValue::Integer(1)),
                ("TFIELDS", KeywordValue::Integer(3)),
                ("TTYPE1", KeywordValue::String("flags".into())),
                ("TFORM1", KeywordValue::String("2B".into())),
                ("TTYPE2", KeywordValue::String("uniq".into())),
                ("TFORM2", KeywordValue::String("1J".into())),
                ("TTYPE3", KeywordValue::String("ProbDensity".into())),
                ("TFORM3", KeywordValue::String("E".into())),
            ],
        )
        .unwrap();
        for u in 4..16 {
            buf.extend([0xff, 0xff]);
            buf.write_i32::<BigEndian>(u).unwrap();
            buf.write_f32::<BigEndian>(0.25).unwrap();
        }

        let map = parse_skymap_fits(Cursor::new(buf)).unwrap();
        assert_eq!(map.len(), 12);
        assert_eq!(map.as_table().uniq, (4..16).collect::<Vec<u64>>());
        assert_eq!(map.probdensity(), &[0.25; 12]);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            &[
                ("SIMPLE", KeywordValue::Logical(true)),
                ("BITPIX", KeywordValue::Integer(8)),
                ("NAXIS", KeywordValue::Integer(0)),
            ],
        )
        .unwrap();
        write_header(
            &mut buf,
            &[
                ("XTENSION", KeywordValue::String("BINTABLE".into())),
                ("BITPIX", KeywordValue::Integer(8)),
                ("NAXIS", KeywordValue::Integer(2)),
                ("NAXIS1", KeywordValue::Integer(8)),
                ("NAXIS2", KeywordValue::Integer(0)),
                ("TFIELDS", KeywordValue::Integer(1)),
                ("TTYPE1", KeywordValue::String("UNIQ".into())),
                ("TFORM1", KeywordValue::String("K".into())),
            ],
        )
        .unwrap();
        let err = parse_skymap_fits(Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("PROBDENSITY"));
    }

    #[test]
    fn test_truncated_and_foreign_files_are_rejected() {
        let buf = fits_bytes(&three_d_map());
        let header_end = 2 * BLOCK_SIZE;
        let err = parse_skymap_fits(Cursor::new(&buf[..header_end + 100])).unwrap_err();
        assert!(matches!(err, LocalizationError::Fits { .. }));
        assert!(err.to_string().contains("truncated"));

        let err = parse_skymap_fits(Cursor::new(&buf[..BLOCK_SIZE])).unwrap_err();
        assert!(err.to_string().contains("BINTABLE"));

        let err = parse_skymap_fits(Cursor::new(b"UNIQ,PROBDENSITY\n4,0.1\n".to_vec())).unwrap_err();
        assert!(matches!(err, LocalizationError::Fits { .. }));
    }

    #[test]
    fn test_ring_ordered_table_is_rejected() {
        let mut buf = fits_bytes(&three_d_map());
        let pos = buf
            .windows(8)
            .position(|w| w == b"ORDERING")
            .unwrap();
        buf[pos + 11..pos + 16].copy_from_slice(b"RING ");
        let err = parse_skymap_fits(Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("ORDERING"));
    }
}
