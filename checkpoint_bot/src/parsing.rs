use std::{fmt::Display, str::FromStr};

use crate::reports::ReportId;

/// A report typed out by hand as `lat, lon[, description]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatesInput {
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatesParseError {
    /// Doesn't look like coordinates at all. Probably an address.
    NotCoordinates,
    /// Looks like coordinates, but they're off the map.
    OutOfRange,
}

impl Display for CoordinatesParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCoordinates => write!(f, "not a pair of coordinates"),
            Self::OutOfRange => write!(
                f,
                "latitude must be within -90..90 and longitude within -180..180"
            ),
        }
    }
}

impl std::error::Error for CoordinatesParseError {}

impl FromStr for CoordinatesInput {
    type Err = CoordinatesParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parts = text.splitn(3, ',');

        let mut number = || -> Result<f64, CoordinatesParseError> {
            parts
                .next()
                .map(str::trim)
                .and_then(|x| x.parse::<f64>().ok())
                .filter(|x| x.is_finite())
                .ok_or(CoordinatesParseError::NotCoordinates)
        };

        let latitude = number()?;
        let longitude = number()?;

        let description = parts
            .next()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinatesParseError::OutOfRange);
        }

        Ok(CoordinatesInput {
            latitude,
            longitude,
            description,
        })
    }
}

/// Payload of the voting buttons under a published report.
///
/// Telegram only allows 64 bytes in there, which is plenty for `yes_<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// "Still there."
    Confirm(ReportId),
    /// "Gone."
    Retract(ReportId),
}

impl Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vote::Confirm(id) => write!(f, "yes_{id}"),
            Vote::Retract(id) => write!(f, "no_{id}"),
        }
    }
}

impl FromStr for Vote {
    type Err = &'static str;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (action, id) = data.split_once('_').ok_or("No separator")?;
        let id = ReportId(id.parse().map_err(|_| "Failed to parse report ID")?);

        match action {
            "yes" => Ok(Vote::Confirm(id)),
            "no" => Ok(Vote::Retract(id)),
            _ => Err("Unknown vote type"),
        }
    }
}
