//! Error types for localization maps and their derived views.
//!
//! | Variant | Raised by | Fatal to |
//! |---------|-----------|----------|
//! | [`MalformedMap`](LocalizationError::MalformedMap) | map construction, ingestion | construction; nothing is kept |
//! | [`InvalidTileId`](LocalizationError::InvalidTileId) | tile encode/decode | the single call |
//! | [`UnsupportedResolution`](LocalizationError::UnsupportedResolution) | rasterize, materialize | the single call; retry with another order |
//! | [`Parse`](LocalizationError::Parse), [`Fits`](LocalizationError::Fits) | CSV and FITS ingestion | the whole file |
//! | [`NotFound`](LocalizationError::NotFound), [`PermissionDenied`](LocalizationError::PermissionDenied) | store | the single call |
//!
//! [`ExtinctionError`] is separate: the summary extractor downgrades it to a
//! missing value and never returns it.

use skymap_coords::CoordError;
use skymap_healpix::HealpixError;
use thiserror::Error;

pub type LocalizationResult<T> = Result<T, LocalizationError>;

#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("Malformed map: {message}")]
    MalformedMap { message: String },

    #[error("Invalid tile: {source}")]
    InvalidTileId {
        #[from]
        source: HealpixError,
    },

    #[error("Invalid coordinate: {source}")]
    Coordinate {
        #[from]
        source: CoordError,
    },

    #[error("Unsupported resolution (order {order}): {message}")]
    UnsupportedResolution { order: u32, message: String },

    #[error("Localization {id} not found")]
    NotFound { id: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid FITS file: {message}")]
    Fits { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl LocalizationError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMap {
            message: message.into(),
        }
    }

    pub fn unsupported_resolution(order: u32, message: impl Into<String>) -> Self {
        Self::UnsupportedResolution {
            order,
            message: message.into(),
        }
    }

    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn fits(message: impl Into<String>) -> Self {
        Self::Fits {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True if the caller may retry the same operation with other parameters.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnsupportedResolution { .. } | Self::Io { .. })
    }
}

/// Failure of the external dust-extinction lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtinctionError {
    #[error("Extinction lookup unavailable: {message}")]
    Unavailable { message: String },

    #[error("No extinction value at ra={ra:.4}°, dec={dec:.4}°")]
    OutOfRange { ra: f64, dec: f64 },

    #[error("Extinction lookup timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Extinction lookup failed: {message}")]
    Failed { message: String },
}

impl ExtinctionError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
