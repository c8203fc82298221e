//! `skymap rasterize`: flat RING-ordered rasters

use crate::cli::RasterizeArgs;
use anyhow::Context;
use byteorder::{LittleEndian, WriteBytesExt};
use skymap_localization::ingest::read_skymap;
use skymap_localization::raster::{rasterize, rasterize_3d};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn run(args: &RasterizeArgs) -> anyhow::Result<()> {
    let map = read_skymap(&args.map)?;
    let start = Instant::now();
    let raster = if args.distance {
        rasterize_3d(&map, args.order)?
    } else {
        rasterize(&map, args.order)?
    };
    log::info!(
        "rasterized to order {} ({} cells) in {:.2?}",
        raster.order(),
        raster.len(),
        start.elapsed()
    );

    let mut written = vec![write_column(&args.output, "prob", raster.prob())?];
    if let Some(d) = raster.distance() {
        written.push(write_column(&args.output, "distmu", &d.distmu)?);
        written.push(write_column(&args.output, "distsigma", &d.distsigma)?);
        written.push(write_column(&args.output, "distnorm", &d.distnorm)?);
    } else if args.distance {
        log::warn!("map has no distance columns; wrote probability only");
    }

    println!("nside: {}", raster.nside());
    println!("Cells: {}", raster.len());
    println!("Total probability: {:.6}", raster.total_probability());
    for path in written {
        println!("Wrote {:?}", path);
    }
    Ok(())
}

fn write_column(prefix: &Path, column: &str, values: &[f64]) -> anyhow::Result<PathBuf> {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".{}.f64", column));
    let path = PathBuf::from(name);

    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut out = BufWriter::new(file);
    for value in values {
        out.write_f64::<LittleEndian>(*value)?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}
