//! `skymap summary`: JSON point summary

use crate::cli::SummaryArgs;
use serde::Serialize;
use skymap_localization::config::SkymapConfig;
use skymap_localization::ingest::read_skymap;
use skymap_localization::summary::{credible_areas, CredibleArea, LocalizationSummary, SummaryExtractor};

#[derive(Serialize)]
struct SummaryReport {
    #[serde(flatten)]
    summary: LocalizationSummary,
    working_order: u32,
    total_probability: f64,
    credible_areas: Vec<CredibleArea>,
}

pub fn run(args: &SummaryArgs, config: &SkymapConfig) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(path) = &args.dustmap {
        config.extinction.dustmap_path = Some(path.clone());
    }
    if let Some(order) = args.working_order {
        config.summary.working_order = order;
    }

    let map = read_skymap(&args.map)?;
    let extractor = SummaryExtractor::from_config(&config)?;
    let summary = extractor.summarize(&map)?;

    let report = SummaryReport {
        summary,
        working_order: config.summary.working_order,
        total_probability: map.total_probability(),
        credible_areas: credible_areas(&map, &args.levels),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
