//! Equipment readings and the source-preference policy used to merge them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Streamed or manually entered sensor value
    LiveSensor,
    /// Extracted from a maintenance-check form column
    DerivedFromCheck,
}

impl std::fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingSource::LiveSensor => write!(f, "live_sensor"),
            ReadingSource::DerivedFromCheck => write!(f, "derived_from_check"),
        }
    }
}

/// A single typed measurement for one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub equipment_id: String,
    /// Canonical parameter name (e.g. "supply_air_temperature")
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub source: ReadingSource,
}

impl Reading {
    pub fn new(
        equipment_id: impl Into<String>,
        sensor_type: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: ReadingSource,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            sensor_type: sensor_type.into(),
            value,
            unit: unit.into(),
            timestamp,
            source,
        }
    }

    /// Identity used for de-duplication: `(equipment_id, sensor_type, timestamp)`.
    pub fn key(&self) -> (&str, &str, DateTime<Utc>) {
        (&self.equipment_id, &self.sensor_type, self.timestamp)
    }
}

/// Which reading sources are eligible for an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSourcePreference {
    /// Union of both sources, live readings win ties
    #[default]
    Auto,
    /// Live/manual readings only, falling back to check-derived readings when empty
    ManualOnly,
    /// Check-derived readings only, falling back to live readings when empty
    StandardOnly,
}

impl std::fmt::Display for ReadingSourcePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingSourcePreference::Auto => write!(f, "auto"),
            ReadingSourcePreference::ManualOnly => write!(f, "manual_only"),
            ReadingSourcePreference::StandardOnly => write!(f, "standard_only"),
        }
    }
}

impl std::str::FromStr for ReadingSourcePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "manual_only" | "manual" => Ok(Self::ManualOnly),
            "standard_only" | "standard" => Ok(Self::StandardOnly),
            other => Err(format!(
                "unknown source preference '{other}' (expected auto, manual_only or standard_only)"
            )),
        }
    }
}
