//! `skymap materialize`: fixed-order tile tables

use crate::cli::MaterializeArgs;
use anyhow::Context;
use skymap_localization::ingest::read_skymap;
use skymap_localization::materialize::materialize;
use skymap_localization::tile_table::TileTable;
use skymap_localization::LocalizationId;

pub fn run(args: &MaterializeArgs) -> anyhow::Result<()> {
    let map = read_skymap(&args.map)?;
    let id = match &args.id {
        Some(text) => text
            .parse::<LocalizationId>()
            .with_context(|| format!("Invalid localization id: {}", text))?,
        None => LocalizationId::new(),
    };
    let order = args.order.unwrap_or_else(|| map.max_order());

    let tiles = materialize(id, &map, order)?;
    let header = TileTable::write(&args.output, &tiles)?;

    println!("{}", header);
    println!("Wrote {:?}", args.output);
    Ok(())
}
