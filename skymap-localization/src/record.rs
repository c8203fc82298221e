//! Stored localization records and their annotations.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LocalizationError, LocalizationResult};
use crate::map::MultiOrderMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizationId(Uuid);

impl LocalizationId {
    /// A fresh random (v4) identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl From<Uuid> for LocalizationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for LocalizationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for LocalizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the user that submitted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// One probabilistic sky map attached to an event.
///
/// `dateobs` is the event time and groups the localizations of one event.
/// The map itself is shared, since it is immutable after ingestion.
/// `contour` holds GeoJSON credible-region contours when they are known.
#[derive(Debug, Clone)]
pub struct SkyLocalization {
    pub id: LocalizationId,
    pub dateobs: DateTime<Utc>,
    pub localization_name: Option<String>,
    pub sent_by: UserId,
    pub created_at: DateTime<Utc>,
    pub contour: Option<serde_json::Value>,
    pub map: Arc<MultiOrderMap>,
}

impl SkyLocalization {
    pub fn new(
        dateobs: DateTime<Utc>,
        localization_name: Option<String>,
        sent_by: UserId,
        map: MultiOrderMap,
    ) -> Self {
        Self {
            id: LocalizationId::new(),
            dateobs,
            localization_name,
            sent_by,
            created_at: Utc::now(),
            contour: None,
            map: Arc::new(map),
        }
    }

    /// Attaches GeoJSON contours.
    ///
    /// # Errors
    /// [`LocalizationError::MalformedMap`] unless `contour` is a JSON object
    /// with a string `type` member.
    pub fn with_contour(mut self, contour: serde_json::Value) -> LocalizationResult<Self> {
        validate_contour(&contour)?;
        self.contour = Some(contour);
        Ok(self)
    }

    pub fn is_3d(&self) -> bool {
        self.map.is_3d()
    }
}

/// Free-form JSON metadata attached to a localization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationProperty {
    pub id: u64,
    pub localization_id: LocalizationId,
    pub sent_by: UserId,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationTag {
    pub id: u64,
    pub localization_id: LocalizationId,
    pub sent_by: UserId,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

pub(crate) fn validate_contour(contour: &serde_json::Value) -> LocalizationResult<()> {
    match contour.get("type") {
        Some(serde_json::Value::String(_)) => Ok(()),
        _ => Err(LocalizationError::malformed(
            "contour must be a GeoJSON object with a type",
        )),
    }
}
