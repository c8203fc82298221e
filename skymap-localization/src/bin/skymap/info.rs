//! `skymap info`: map statistics

use crate::cli::InfoArgs;
use skymap_localization::ingest::read_skymap;
use skymap_localization::summary::credible_areas;

pub fn run(args: &InfoArgs) -> anyhow::Result<()> {
    let map = read_skymap(&args.map)?;

    println!("Map: {:?}", args.map);
    println!("Tiles: {}", map.len());
    println!("Orders: {}..={}", map.min_order(), map.max_order());
    println!("Distance columns: {}", if map.is_3d() { "yes" } else { "no" });
    println!("Total probability: {:.6}", map.total_probability());
    for area in credible_areas(&map, &args.levels) {
        println!(
            "{:>3.0}% credible area: {:.2} deg²",
            area.level * 100.0,
            area.area_deg2
        );
    }
    Ok(())
}
