use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Description used when the reporter didn't give one.
pub static DEFAULT_DESCRIPTION: &str = "DPS checkpoint";

/// ID of a single report.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub u64);

impl Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Where the checkpoint was spotted.
///
/// On disk this is flattened into the report, so a record carries either
/// `latitude` and `longitude` keys or an `address` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Coordinates { latitude: f64, longitude: f64 },
    Address { address: String },
}

impl Location {
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self::Coordinates {
            latitude,
            longitude,
        }
    }

    pub fn address(address: impl Into<String>) -> Self {
        Self::Address {
            address: address.into(),
        }
    }

    /// True if this is a sane pair of coordinates, or a non-blank address.
    pub fn is_valid(&self) -> bool {
        match self {
            Location::Coordinates {
                latitude,
                longitude,
            } => {
                latitude.is_finite()
                    && longitude.is_finite()
                    && (-90.0..=90.0).contains(latitude)
                    && (-180.0..=180.0).contains(longitude)
            }
            Location::Address { address } => !address.trim().is_empty(),
        }
    }

    /// Link to this location on Yandex Maps.
    pub fn map_link(&self) -> Url {
        let params = match self {
            Location::Coordinates {
                latitude,
                longitude,
            } => vec![
                ("ll", format!("{longitude},{latitude}")),
                ("z", "14".to_string()),
            ],
            Location::Address { address } => vec![("text", address.clone())],
        };

        Url::parse_with_params("https://yandex.ru/maps/", params)
            .expect("URL will always be valid")
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Coordinates {
                latitude,
                longitude,
            } => write!(f, "{latitude}, {longitude}"),
            Location::Address { address } => f.write_str(address),
        }
    }
}

/// A single sighting of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub(super) id: ReportId,
    pub(super) description: String,
    #[serde(flatten)]
    pub(super) location: Location,
    pub(super) confirm_count: u32,
    pub(super) retract_count: u32,
    pub(super) expires_at: DateTime<Utc>,
}

impl Report {
    /// Returns the ID of this report.
    #[must_use]
    pub fn id(&self) -> ReportId {
        self.id
    }
    /// Returns the description of this report.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
    /// Returns where the checkpoint is.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }
    /// Returns how many people said it's still there, including the reporter.
    #[must_use]
    pub fn confirm_count(&self) -> u32 {
        self.confirm_count
    }
    /// Returns how many people said it's gone.
    #[must_use]
    pub fn retract_count(&self) -> u32 {
        self.retract_count
    }
    /// Returns when this report stops being tracked.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Result of [`Tracker::retract`].
///
/// [`Tracker::retract`]: super::Tracker::retract
#[derive(Debug, Clone, PartialEq)]
pub struct RetractResult {
    /// True if this vote pushed the report over the threshold and it was removed.
    pub removed: bool,
    /// The report after the vote. If it was removed, these are its final counts.
    pub report: Report,
}
