//! `skymap overlap`: footprint queries against a tile table

use crate::cli::OverlapArgs;
use anyhow::Context;
use skymap_healpix::Tile;
use skymap_localization::tile_table::TileTable;

pub fn run(args: &OverlapArgs) -> anyhow::Result<()> {
    let table = TileTable::open(&args.table)?;
    let footprint = args
        .footprint
        .iter()
        .map(|&uniq| Tile::from_uniq(uniq).with_context(|| format!("Invalid footprint tile {}", uniq)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let hits = table.overlapping(&footprint);
    println!("{}", table.header());
    println!("Footprint tiles: {}", footprint.len());
    println!("Overlapping tiles: {}", hits.len());
    println!("Probability within footprint: {:.6}", table.probability_within(&footprint));

    if args.list {
        println!("{:>20}  {:>14}", "UNIQ", "PROBDENSITY");
        for record in &hits {
            println!("{:>20}  {:>14.6e}", record.uniq, record.probdensity);
        }
    }
    Ok(())
}
