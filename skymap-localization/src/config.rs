//! Runtime configuration.
//!
//! Configuration is an explicit value handed to the components that need it;
//! nothing here is process-global. A JSON file may override any subset of the
//! defaults:
//!
//! ```json
//! {
//!   "summary": { "working_order": 9, "extinction_timeout_ms": 2000 },
//!   "extinction": { "dustmap_path": "/data/dust/sfd_order7.skyd" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{LocalizationError, LocalizationResult};
use crate::raster::MAX_RASTER_ORDER;

/// Order of the flat raster used for peak finding (nside 512).
pub const DEFAULT_WORKING_ORDER: u32 = 9;

pub const DEFAULT_EXTINCTION_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkymapConfig {
    pub summary: SummaryConfig,
    pub extinction: ExtinctionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// HEALPix order of the flat raster searched for the posterior peak.
    pub working_order: u32,
    /// Upper bound on a single extinction lookup.
    pub extinction_timeout_ms: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            working_order: DEFAULT_WORKING_ORDER,
            extinction_timeout_ms: DEFAULT_EXTINCTION_TIMEOUT_MS,
        }
    }
}

impl SummaryConfig {
    pub fn extinction_timeout(&self) -> Duration {
        Duration::from_millis(self.extinction_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtinctionConfig {
    /// Dust map file (see [`crate::dustmap::HealpixDustMap`]). No lookup is
    /// performed when unset.
    pub dustmap_path: Option<PathBuf>,
}

impl SkymapConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> LocalizationResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| LocalizationError::io(format!("reading {:?}", path), err))?;
        let config = Self::from_json_str(&text)?;
        log::debug!("loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> LocalizationResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| LocalizationError::config(format!("invalid JSON: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LocalizationResult<()> {
        if self.summary.working_order > MAX_RASTER_ORDER {
            return Err(LocalizationError::config(format!(
                "summary.working_order {} exceeds the raster limit {}",
                self.summary.working_order, MAX_RASTER_ORDER
            )));
        }
        if self.summary.extinction_timeout_ms == 0 {
            return Err(LocalizationError::config(
                "summary.extinction_timeout_ms must be positive",
            ));
        }
        Ok(())
    }
}
