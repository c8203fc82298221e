//! Point summaries of a localization.
//!
//! The summary locates the densest cell of a fixed-resolution raster, reports
//! its center in equatorial and galactic coordinates, and attaches the dust
//! reddening E(B−V) toward it when an extinction lookup is configured.
//!
//! The extinction lookup is treated as an unreliable external call: it runs on
//! its own thread under a deadline, is tried once, and any failure leaves
//! `ebv` empty with a warning. Failures include errors, panics and timeouts,
//! a dust map that cannot be opened, or no lookup at all.
//!
//! A lookup that misses its deadline keeps its thread until it returns. At
//! most [`MAX_LOOKUP_THREADS`] lookup threads exist per extractor; beyond
//! that, lookups are skipped until one finishes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skymap_coords::{GalacticPosition, ICRSPosition};
use skymap_healpix::{nest2ring, pix2ang_nest};

use crate::config::{SkymapConfig, SummaryConfig};
use crate::dustmap::HealpixDustMap;
use crate::errors::{ExtinctionError, LocalizationError, LocalizationResult};
use crate::map::MultiOrderMap;
use crate::raster::rasterize_nested;

/// Upper bound on live extinction lookup threads, counting abandoned ones.
pub const MAX_LOOKUP_THREADS: usize = 4;

/// Source of E(B−V) reddening toward a direction.
pub trait ExtinctionLookup: Send + Sync {
    fn ebv(&self, position: &ICRSPosition) -> Result<f64, ExtinctionError>;
}

impl<F> ExtinctionLookup for F
where
    F: Fn(&ICRSPosition) -> Result<f64, ExtinctionError> + Send + Sync,
{
    fn ebv(&self, position: &ICRSPosition) -> Result<f64, ExtinctionError> {
        self(position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalizationSummary {
    /// Right ascension of the peak, degrees in [0, 360).
    pub ra: f64,
    pub dec: f64,
    pub gal_lat: f64,
    pub gal_lon: f64,
    pub ebv: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleArea {
    pub level: f64,
    pub area_deg2: f64,
}

/// Areas of the smallest regions holding each of `levels` of the probability.
pub fn credible_areas(map: &MultiOrderMap, levels: &[f64]) -> Vec<CredibleArea> {
    levels
        .iter()
        .map(|&level| CredibleArea {
            level,
            area_deg2: map.credible_area_deg2(level),
        })
        .collect()
}

#[derive(Clone)]
pub struct SummaryExtractor {
    config: SummaryConfig,
    lookup: Option<Arc<dyn ExtinctionLookup>>,
    live_lookups: Arc<AtomicUsize>,
}

impl SummaryExtractor {
    pub fn new(config: SummaryConfig, lookup: Option<Arc<dyn ExtinctionLookup>>) -> Self {
        Self {
            config,
            lookup,
            live_lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds an extractor from configuration, opening the dust map if one is
    /// configured. A dust map that cannot be opened only disables extinction.
    pub fn from_config(config: &SkymapConfig) -> LocalizationResult<Self> {
        config.validate()?;
        let lookup = config.extinction.dustmap_path.as_ref().and_then(|path| {
            match HealpixDustMap::open(path) {
                Ok(dust) => Some(Arc::new(dust) as Arc<dyn ExtinctionLookup>),
                Err(err) => {
                    log::warn!("extinction disabled: {:#}", err);
                    None
                }
            }
        });
        Ok(Self::new(config.summary.clone(), lookup))
    }

    pub fn has_extinction(&self) -> bool {
        self.lookup.is_some()
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Summarizes a map.
    ///
    /// The peak is the densest cell of the probability raster at the working
    /// order; among equal cells the one with the lowest RING index wins.
    pub fn summarize(&self, map: &MultiOrderMap) -> LocalizationResult<LocalizationSummary> {
        let order = self.config.working_order;
        let raster = rasterize_nested(map, order, false)?;
        let prob = raster.prob();

        let peak_value = prob.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let peak = prob
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == peak_value)
            .map(|(nest, _)| (nest2ring(order, nest as u64), nest as u64))
            .min()
            .map(|(_, nest)| nest)
            .ok_or_else(|| LocalizationError::malformed("map has no tiles"))?;

        let (ra, dec) = pix2ang_nest(order, peak);
        let position = ICRSPosition::from_degrees(ra, dec)?;
        let galactic = GalacticPosition::from_icrs(&position)?;

        let ebv = self.extinction(position);
        log::debug!(
            "summary at order {}: peak nested pixel {} (ra={:.4}, dec={:.4}), ebv={:?}",
            order,
            peak,
            ra,
            dec,
            ebv
        );

        Ok(LocalizationSummary {
            ra,
            dec,
            gal_lat: galactic.latitude().degrees(),
            gal_lon: galactic.longitude().degrees(),
            ebv,
        })
    }

    fn extinction(&self, position: ICRSPosition) -> Option<f64> {
        let Some(lookup) = self.lookup.clone() else {
            log::warn!("no extinction lookup configured; E(B-V) omitted");
            return None;
        };
        let timeout = self.config.extinction_timeout();
        match run_with_timeout(lookup, position, timeout, &self.live_lookups) {
            Ok(ebv) => Some(ebv),
            Err(err) => {
                log::warn!("E(B-V) omitted toward {}: {}", position, err);
                None
            }
        }
    }
}

/// Decrements the live-thread count when a lookup thread ends, panics
/// included.
struct LiveLookup(Arc<AtomicUsize>);

impl Drop for LiveLookup {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs one lookup on a worker thread. A lookup that misses the deadline is
/// abandoned; its thread finishes on its own and the result is discarded.
/// No thread is started while `live` is at [`MAX_LOOKUP_THREADS`].
fn run_with_timeout(
    lookup: Arc<dyn ExtinctionLookup>,
    position: ICRSPosition,
    timeout: Duration,
    live: &Arc<AtomicUsize>,
) -> Result<f64, ExtinctionError> {
    live.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
        (n < MAX_LOOKUP_THREADS).then_some(n + 1)
    })
    .map_err(|n| {
        ExtinctionError::unavailable(format!("{} earlier lookups still running", n))
    })?;
    let guard = LiveLookup(Arc::clone(live));

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("extinction-lookup".into())
        .spawn(move || {
            let _guard = guard;
            let _ = tx.send(lookup.ebv(&position));
        })
        .map_err(|err| ExtinctionError::unavailable(err.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(ebv)) if ebv.is_finite() => Ok(ebv),
        Ok(Ok(ebv)) => Err(ExtinctionError::failed(format!("non-finite value {}", ebv))),
        Ok(Err(err)) => Err(err),
        Err(RecvTimeoutError::Timeout) => Err(ExtinctionError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => {
            Err(ExtinctionError::failed("lookup thread panicked"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymap_healpix::{ang2pix_nest, encode};
    use std::f64::consts::PI;

    fn config(order: u32, timeout_ms: u64) -> SummaryConfig {
        SummaryConfig {
            working_order: order,
            extinction_timeout_ms: timeout_ms,
        }
    }

    /// Uniform background with one hot order-4 tile around (ra, dec).
    fn peaked_map(ra: f64, dec: f64) -> MultiOrderMap {
        let hot = ang2pix_nest(4, ra, dec);
        let face = hot >> 8;
        let mut uniq = Vec::new();
        let mut density = Vec::new();
        for f in 0..12u64 {
            if f != face {
                uniq.push(encode(0, f).unwrap());
                density.push(0.01);
            }
        }
        for p in (face << 8)..((face + 1) << 8) {
            uniq.push(encode(4, p).unwrap());
            density.push(if p == hot { 50.0 } else { 0.01 });
        }
        MultiOrderMap::new(uniq, density, None).unwrap()
    }

    #[test]
    fn test_peak_location() {
        let map = peaked_map(150.0, 30.0);
        let extractor = SummaryExtractor::new(config(6, 100), None);
        let summary = extractor.summarize(&map).unwrap();
        let tile_size = skymap_healpix::geometry::pixel_resolution_deg(4);
        let sep = skymap_healpix::angular_separation_deg(summary.ra, summary.dec, 150.0, 30.0);
        assert!(sep < 2.0 * tile_size, "peak {} deg away", sep);
        assert!(summary.ebv.is_none());
    }

    #[test]
    fn test_galactic_projection() {
        let map = peaked_map(266.4, -28.9);
        let summary = SummaryExtractor::new(config(6, 100), None)
            .summarize(&map)
            .unwrap();
        let position = ICRSPosition::from_degrees(summary.ra, summary.dec).unwrap();
        let galactic = GalacticPosition::from_icrs(&position).unwrap();
        assert!((summary.gal_lat - galactic.latitude().degrees()).abs() < 1e-12);
        assert!((summary.gal_lon - galactic.longitude().degrees()).abs() < 1e-12);
        // Near the galactic center.
        assert!(summary.gal_lat.abs() < 8.0);
    }

    #[test]
    fn test_lookup_value_is_reported() {
        let lookup: Arc<dyn ExtinctionLookup> = Arc::new(|_: &ICRSPosition| -> Result<f64, ExtinctionError> { Ok(0.12) });
        let extractor = SummaryExtractor::new(config(4, 1000), Some(lookup));
        let summary = extractor.summarize(&peaked_map(10.0, 10.0)).unwrap();
        assert_eq!(summary.ebv, Some(0.12));
    }

    #[test]
    fn test_failing_lookup_degrades() {
        let failing: Arc<dyn ExtinctionLookup> =
            Arc::new(|_: &ICRSPosition| -> Result<f64, ExtinctionError> {
                Err(ExtinctionError::unavailable("service down"))
            });
        let extractor = SummaryExtractor::new(config(4, 1000), Some(failing));
        let summary = extractor.summarize(&peaked_map(10.0, 10.0)).unwrap();
        assert!(summary.ebv.is_none());
        assert!(summary.ra.is_finite() && summary.gal_lat.is_finite());
    }

    #[test]
    fn test_panicking_lookup_degrades() {
        let panicking: Arc<dyn ExtinctionLookup> =
            Arc::new(|_: &ICRSPosition| -> Result<f64, ExtinctionError> { panic!("boom") });
        let extractor = SummaryExtractor::new(config(3, 1000), Some(panicking));
        assert!(extractor.summarize(&peaked_map(10.0, 10.0)).unwrap().ebv.is_none());
    }

    #[test]
    fn test_slow_lookup_times_out() {
        let slow: Arc<dyn ExtinctionLookup> = Arc::new(|_: &ICRSPosition| -> Result<f64, ExtinctionError> {
            thread::sleep(Duration::from_millis(500));
            Ok(0.3)
        });
        let extractor = SummaryExtractor::new(config(3, 20), Some(slow));
        assert!(extractor.summarize(&peaked_map(10.0, 10.0)).unwrap().ebv.is_none());
    }

    #[test]
    fn test_stalled_lookups_are_bounded() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));
        let calls = Arc::new(AtomicUsize::new(0));
        let hanging: Arc<dyn ExtinctionLookup> = {
            let (release_rx, calls) = (Arc::clone(&release_rx), Arc::clone(&calls));
            Arc::new(move |_: &ICRSPosition| -> Result<f64, ExtinctionError> {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.lock().recv();
                Ok(0.2)
            })
        };
        let extractor = SummaryExtractor::new(config(3, 10), Some(hanging));
        let map = peaked_map(10.0, 10.0);
        for _ in 0..MAX_LOOKUP_THREADS + 3 {
            let summary = extractor.summarize(&map).unwrap();
            assert!(summary.ebv.is_none());
        }
        assert!(extractor.live_lookups.load(Ordering::SeqCst) <= MAX_LOOKUP_THREADS);

        drop(release_tx);
        for _ in 0..200 {
            if extractor.live_lookups.load(Ordering::SeqCst) == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(extractor.live_lookups.load(Ordering::SeqCst), 0);
        assert!(calls.load(Ordering::SeqCst) <= MAX_LOOKUP_THREADS);
    }

    #[test]
    fn test_unreadable_dust_map_disables_extinction() {
        let mut config = SkymapConfig::default();
        config.summary.working_order = 4;
        config.extinction.dustmap_path = Some("/nonexistent/dust.skyd".into());
        let extractor = SummaryExtractor::from_config(&config).unwrap();
        assert!(!extractor.has_extinction());

        let summary = extractor.summarize(&peaked_map(150.0, 30.0)).unwrap();
        assert!(summary.ebv.is_none());
        let sep = skymap_healpix::angular_separation_deg(summary.ra, summary.dec, 150.0, 30.0);
        assert!(sep < 10.0, "peak {} deg away", sep);
    }

    #[test]
    fn test_ties_pick_lowest_ring_index() {
        // Uniform sky: every cell ties, ring pixel 0 is the first cell of
        // the northernmost ring.
        let map = MultiOrderMap::new((4..16).collect(), vec![1.0 / (4.0 * PI); 12], None).unwrap();
        let summary = SummaryExtractor::new(config(2, 100), None)
            .summarize(&map)
            .unwrap();
        let (ra, dec) = (0..192u64)
            .find(|&n| nest2ring(2, n) == 0)
            .map(|n| pix2ang_nest(2, n))
            .unwrap();
        assert_eq!((summary.ra, summary.dec), (ra, dec));
        assert!(summary.dec > 75.0);
    }

    #[test]
    fn test_credible_areas() {
        let map = MultiOrderMap::new((4..16).collect(), vec![1.0 / (4.0 * PI); 12], None).unwrap();
        let areas = credible_areas(&map, &[0.5, 0.9]);
        let sky = 4.0 * PI * skymap_healpix::constants::SQDEG_PER_SR;
        assert!((areas[0].area_deg2 - 0.5 * sky).abs() < 1e-6);
        assert!((areas[1].area_deg2 - 0.9 * sky).abs() < 1e-6);
    }
}
