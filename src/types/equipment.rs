//! Equipment records, maintenance checks and supplemental reports
//!
//! These are the rows the storage collaborator hands to the diagnostic core.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and nameplate data for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentInfo {
    pub id: String,
    /// Free-text name as entered by facilities staff (e.g. "Trane CVHE Chiller #2")
    pub name: String,
    /// Declared type (e.g. "chiller", "ahu", "rtu")
    pub equipment_type: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub installed_on: Option<NaiveDate>,
    /// Last surveyed condition, 0 (failed) to 100 (as new)
    #[serde(default)]
    pub condition_pct: Option<f64>,
}

impl EquipmentInfo {
    /// Placeholder used when the store has no record for an id.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            equipment_type: "unknown".to_string(),
            manufacturer: None,
            model: None,
            location: None,
            installed_on: None,
            condition_pct: None,
        }
    }

    /// Text used for profile pattern matching: name, manufacturer and model.
    pub fn match_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(m) = &self.manufacturer {
            parts.push(m);
        }
        if let Some(m) = &self.model {
            parts.push(m);
        }
        parts.join(" ")
    }

    /// Age in fractional years at `now`, if the install date is known.
    pub fn age_years(&self, now: DateTime<Utc>) -> Option<f64> {
        let installed = self.installed_on?;
        let days = (now.date_naive() - installed).num_days();
        Some((days.max(0) as f64) / 365.25)
    }
}

/// Declared cadence of a maintenance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Daily => write!(f, "daily"),
            Cadence::Weekly => write!(f, "weekly"),
            Cadence::Monthly => write!(f, "monthly"),
            Cadence::Quarterly => write!(f, "quarterly"),
        }
    }
}

/// A completed maintenance-check form.
///
/// Equipment-type-specific columns are kept as a column → value map so the
/// same record type serves chillers, air handlers and rooftop units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceCheck {
    pub id: String,
    pub equipment_id: String,
    pub cadence: Cadence,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub technician: Option<String>,
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Kinds of supplemental evidence that contribute to data-quality scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Refrigerant,
    Vibration,
    Condenser,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Refrigerant => write!(f, "refrigerant"),
            ReportKind::Vibration => write!(f, "vibration"),
            ReportKind::Condenser => write!(f, "condenser"),
        }
    }
}

/// Refrigerant log, vibration survey or condenser service record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementalReport {
    pub id: String,
    pub equipment_id: String,
    pub kind: ReportKind,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_age_years() {
        let mut eq = EquipmentInfo::unknown("CH-1");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(eq.age_years(now).is_none());

        eq.installed_on = NaiveDate::from_ymd_opt(2014, 1, 1);
        let age = eq.age_years(now).unwrap();
        assert!((age - 10.0).abs() < 0.01, "age was {age}");
    }

    #[test]
    fn test_install_date_in_future_clamps_to_zero() {
        let mut eq = EquipmentInfo::unknown("CH-1");
        eq.installed_on = NaiveDate::from_ymd_opt(2030, 1, 1);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(eq.age_years(now), Some(0.0));
    }

    #[test]
    fn test_match_text_includes_nameplate() {
        let eq = EquipmentInfo {
            manufacturer: Some("Trane".to_string()),
            model: Some("CVHE".to_string()),
            ..EquipmentInfo::unknown("Chiller 2")
        };
        assert_eq!(eq.match_text(), "Chiller 2 Trane CVHE");
    }
}
