//! Equipment Failure Profile Registry
//!
//! Maps equipment identity to a failure-mode profile. Matching is a single
//! ordered rule list evaluated once against the lower-cased name and type:
//! manufacturer/model rules first, then equipment-type rules, then a generic
//! default. Resolution is total.

pub mod weibull;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use weibull::{condition_factor, weibull_failure_probability, WeibullEstimate};

// ============================================================================
// Profile types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    pub mode: String,
    /// Share of historical failures attributed to this mode
    pub probability: f64,
    /// Repair cost range in USD: `[min, max]`
    pub cost_range: [f64; 2],
    pub symptoms: BTreeSet<String>,
}

/// Static reliability reference data for one class of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentFailureProfile {
    pub equipment_type: String,
    pub manufacturer: Option<String>,
    pub typical_life_years: f64,
    pub failure_modes: Vec<FailureMode>,
    /// Task → interval in months
    pub maintenance_intervals: BTreeMap<String, u32>,
}

/// A resolved profile together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    /// Rule label, e.g. `trane_cvhe`, `ahu`, `generic`
    pub label: String,
    pub profile: EquipmentFailureProfile,
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Patterns {
    /// Every pattern must appear
    All(&'static [&'static str]),
    /// At least one pattern must appear
    Any(&'static [&'static str]),
}

impl Patterns {
    fn matches(self, text: &str) -> bool {
        match self {
            Patterns::All(p) => p.iter().all(|s| text.contains(s)),
            Patterns::Any(p) => p.iter().any(|s| text.contains(s)),
        }
    }
}

struct ProfileRule {
    label: &'static str,
    patterns: Patterns,
    build: fn() -> EquipmentFailureProfile,
}

/// Evaluated top to bottom; the first match wins.
const RULES: &[ProfileRule] = &[
    ProfileRule { label: "trane_cvhe", patterns: Patterns::All(&["trane", "cvhe"]), build: trane_cvhe },
    ProfileRule { label: "carrier_19xr", patterns: Patterns::All(&["carrier", "19xr"]), build: carrier_19xr },
    ProfileRule { label: "york_yk", patterns: Patterns::All(&["york", "yk"]), build: york_yk },
    ProfileRule { label: "cooling_tower", patterns: Patterns::Any(&["cooling tower", "cooling_tower"]), build: cooling_tower },
    ProfileRule { label: "chiller", patterns: Patterns::Any(&["chiller"]), build: chiller },
    ProfileRule { label: "ahu", patterns: Patterns::Any(&["ahu", "air handler", "air handling", "air_handler"]), build: air_handler },
    ProfileRule { label: "rtu", patterns: Patterns::Any(&["rtu", "rooftop", "roof top", "packaged unit"]), build: rooftop_unit },
    ProfileRule { label: "boiler", patterns: Patterns::Any(&["boiler"]), build: boiler },
    ProfileRule { label: "pump", patterns: Patterns::Any(&["pump"]), build: pump },
    ProfileRule { label: "fan", patterns: Patterns::Any(&["fan", "exhaust", "blower"]), build: fan },
];

/// Resolve the profile for an equipment name and type.
pub fn resolve_profile(equipment_name: &str, equipment_type: &str) -> EquipmentFailureProfile {
    match_profile(equipment_name, equipment_type).profile
}

/// Like [`resolve_profile`] but also reports which rule matched.
pub fn match_profile(equipment_name: &str, equipment_type: &str) -> ProfileMatch {
    let text = format!("{equipment_name} {equipment_type}").to_lowercase();

    for rule in RULES {
        if rule.patterns.matches(&text) {
            debug!(rule = rule.label, "Resolved failure profile");
            return ProfileMatch { label: rule.label.to_string(), profile: (rule.build)() };
        }
    }

    warn!(
        equipment_name,
        equipment_type, "No failure profile matched, using generic profile"
    );
    ProfileMatch { label: "generic".to_string(), profile: generic() }
}

// ============================================================================
// Profile data
// ============================================================================

fn mode(name: &str, probability: f64, cost_range: [f64; 2], symptoms: &[&str]) -> FailureMode {
    FailureMode {
        mode: name.to_string(),
        probability,
        cost_range,
        symptoms: symptoms.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn intervals(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn trane_cvhe() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "centrifugal_chiller".to_string(),
        manufacturer: Some("Trane".to_string()),
        typical_life_years: 25.0,
        failure_modes: vec![
            mode("compressor_bearing_wear", 0.25, [15_000.0, 45_000.0], &["vibration", "bearing_temperature", "noise"]),
            mode("refrigerant_leak", 0.20, [3_000.0, 12_000.0], &["low_suction_pressure", "high_superheat", "reduced_capacity"]),
            mode("condenser_tube_fouling", 0.20, [5_000.0, 15_000.0], &["high_condenser_approach", "high_discharge_pressure"]),
            mode("purge_unit_failure", 0.15, [2_000.0, 8_000.0], &["non_condensables", "high_purge_runtime", "high_discharge_pressure"]),
            mode("oil_system_degradation", 0.20, [4_000.0, 10_000.0], &["low_oil_pressure", "high_oil_temperature"]),
        ],
        maintenance_intervals: intervals(&[
            ("oil_analysis", 6),
            ("vibration_analysis", 3),
            ("purge_inspection", 1),
            ("eddy_current_tube_test", 36),
            ("refrigerant_analysis", 12),
        ]),
    }
}

fn carrier_19xr() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "centrifugal_chiller".to_string(),
        manufacturer: Some("Carrier".to_string()),
        typical_life_years: 25.0,
        failure_modes: vec![
            mode("compressor_bearing_wear", 0.25, [15_000.0, 40_000.0], &["vibration", "bearing_temperature"]),
            mode("vfd_fault", 0.20, [8_000.0, 30_000.0], &["motor_current", "harmonic_distortion", "trip_events"]),
            mode("refrigerant_leak", 0.20, [3_000.0, 12_000.0], &["low_suction_pressure", "reduced_capacity"]),
            mode("condenser_tube_fouling", 0.20, [5_000.0, 15_000.0], &["high_condenser_approach", "high_discharge_pressure"]),
            mode("oil_system_degradation", 0.15, [4_000.0, 10_000.0], &["low_oil_pressure"]),
        ],
        maintenance_intervals: intervals(&[
            ("oil_analysis", 6),
            ("vibration_analysis", 3),
            ("vfd_inspection", 12),
            ("eddy_current_tube_test", 36),
        ]),
    }
}

fn york_yk() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "centrifugal_chiller".to_string(),
        manufacturer: Some("York".to_string()),
        typical_life_years: 23.0,
        failure_modes: vec![
            mode("motor_winding_failure", 0.20, [20_000.0, 60_000.0], &["motor_current", "winding_temperature"]),
            mode("compressor_bearing_wear", 0.25, [15_000.0, 40_000.0], &["vibration", "noise"]),
            mode("refrigerant_leak", 0.20, [3_000.0, 12_000.0], &["low_suction_pressure", "reduced_capacity"]),
            mode("condenser_tube_fouling", 0.20, [5_000.0, 15_000.0], &["high_condenser_approach"]),
            mode("oil_system_degradation", 0.15, [4_000.0, 10_000.0], &["low_oil_pressure"]),
        ],
        maintenance_intervals: intervals(&[
            ("oil_analysis", 6),
            ("vibration_analysis", 3),
            ("motor_insulation_test", 12),
            ("eddy_current_tube_test", 36),
        ]),
    }
}

fn chiller() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "chiller".to_string(),
        manufacturer: None,
        typical_life_years: 23.0,
        failure_modes: vec![
            mode("compressor_failure", 0.30, [10_000.0, 50_000.0], &["vibration", "motor_current", "noise"]),
            mode("refrigerant_leak", 0.25, [3_000.0, 12_000.0], &["low_suction_pressure", "reduced_capacity"]),
            mode("condenser_tube_fouling", 0.25, [5_000.0, 15_000.0], &["high_condenser_approach", "high_discharge_pressure"]),
            mode("control_failure", 0.20, [1_000.0, 5_000.0], &["erratic_operation", "alarm_history"]),
        ],
        maintenance_intervals: intervals(&[("oil_analysis", 6), ("vibration_analysis", 3), ("tube_cleaning", 12)]),
    }
}

fn air_handler() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "air_handler".to_string(),
        manufacturer: None,
        typical_life_years: 20.0,
        failure_modes: vec![
            mode("belt_wear", 0.25, [200.0, 800.0], &["vibration", "noise", "reduced_airflow"]),
            mode("fan_bearing_failure", 0.25, [800.0, 3_500.0], &["vibration", "bearing_temperature", "noise"]),
            mode("filter_loading", 0.20, [100.0, 600.0], &["filter_pressure_drop", "reduced_airflow"]),
            mode("coil_fouling", 0.15, [1_000.0, 5_000.0], &["supply_air_temperature", "reduced_capacity"]),
            mode("damper_actuator_failure", 0.15, [500.0, 2_500.0], &["return_air_temperature", "erratic_operation"]),
        ],
        maintenance_intervals: intervals(&[
            ("filter_replacement", 3),
            ("belt_inspection", 3),
            ("bearing_lubrication", 6),
            ("coil_cleaning", 12),
        ]),
    }
}

fn rooftop_unit() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "rooftop_unit".to_string(),
        manufacturer: None,
        typical_life_years: 15.0,
        failure_modes: vec![
            mode("compressor_failure", 0.30, [3_000.0, 9_000.0], &["motor_current", "high_discharge_pressure", "noise"]),
            mode("refrigerant_leak", 0.25, [800.0, 4_000.0], &["low_suction_pressure", "supply_air_temperature"]),
            mode("economizer_failure", 0.20, [500.0, 2_500.0], &["return_air_temperature", "erratic_operation"]),
            mode("heat_exchanger_crack", 0.10, [2_000.0, 6_000.0], &["flame_rollout", "carbon_monoxide"]),
            mode("condenser_fan_motor_failure", 0.15, [400.0, 1_500.0], &["high_discharge_pressure", "motor_current"]),
        ],
        maintenance_intervals: intervals(&[
            ("filter_replacement", 3),
            ("coil_cleaning", 6),
            ("refrigerant_check", 6),
            ("heat_exchanger_inspection", 12),
        ]),
    }
}

fn boiler() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "boiler".to_string(),
        manufacturer: None,
        typical_life_years: 25.0,
        failure_modes: vec![
            mode("tube_scaling", 0.30, [2_000.0, 10_000.0], &["stack_temperature", "reduced_efficiency"]),
            mode("burner_failure", 0.25, [1_000.0, 6_000.0], &["flame_failure", "ignition_lockout"]),
            mode("flame_sensor_fault", 0.20, [200.0, 900.0], &["ignition_lockout", "short_cycling"]),
            mode("circulator_seal_leak", 0.25, [500.0, 2_500.0], &["low_water_pressure", "visible_leak"]),
        ],
        maintenance_intervals: intervals(&[("combustion_analysis", 12), ("water_treatment_test", 1), ("tube_inspection", 12)]),
    }
}

fn cooling_tower() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "cooling_tower".to_string(),
        manufacturer: None,
        typical_life_years: 20.0,
        failure_modes: vec![
            mode("fill_fouling", 0.30, [5_000.0, 25_000.0], &["high_condenser_approach", "reduced_capacity"]),
            mode("fan_gearbox_failure", 0.25, [4_000.0, 15_000.0], &["vibration", "noise", "oil_leak"]),
            mode("fan_bearing_failure", 0.20, [1_000.0, 4_000.0], &["vibration", "bearing_temperature"]),
            mode("water_treatment_failure", 0.25, [1_000.0, 8_000.0], &["scale", "biological_growth", "corrosion"]),
        ],
        maintenance_intervals: intervals(&[("water_treatment_test", 1), ("gearbox_oil_change", 6), ("basin_cleaning", 6)]),
    }
}

fn pump() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "pump".to_string(),
        manufacturer: None,
        typical_life_years: 15.0,
        failure_modes: vec![
            mode("mechanical_seal_leak", 0.35, [500.0, 2_000.0], &["visible_leak", "low_discharge_pressure"]),
            mode("bearing_failure", 0.30, [800.0, 3_000.0], &["vibration", "bearing_temperature", "noise"]),
            mode("impeller_wear", 0.15, [1_000.0, 4_000.0], &["reduced_flow", "motor_current"]),
            mode("shaft_misalignment", 0.20, [300.0, 1_500.0], &["vibration", "coupling_wear"]),
        ],
        maintenance_intervals: intervals(&[("bearing_lubrication", 6), ("alignment_check", 12), ("vibration_analysis", 6)]),
    }
}

fn fan() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "fan".to_string(),
        manufacturer: None,
        typical_life_years: 15.0,
        failure_modes: vec![
            mode("bearing_failure", 0.35, [400.0, 2_000.0], &["vibration", "noise", "bearing_temperature"]),
            mode("belt_wear", 0.30, [150.0, 600.0], &["vibration", "reduced_airflow"]),
            mode("motor_failure", 0.20, [800.0, 3_000.0], &["motor_current", "winding_temperature"]),
            mode("wheel_imbalance", 0.15, [300.0, 1_200.0], &["vibration"]),
        ],
        maintenance_intervals: intervals(&[("belt_inspection", 3), ("bearing_lubrication", 6)]),
    }
}

fn generic() -> EquipmentFailureProfile {
    EquipmentFailureProfile {
        equipment_type: "generic_hvac".to_string(),
        manufacturer: None,
        typical_life_years: 18.0,
        failure_modes: vec![
            mode("mechanical_wear", 0.40, [500.0, 5_000.0], &["vibration", "noise"]),
            mode("electrical_fault", 0.30, [300.0, 3_000.0], &["motor_current", "trip_events"]),
            mode("control_failure", 0.30, [200.0, 2_000.0], &["erratic_operation"]),
        ],
        maintenance_intervals: intervals(&[("general_inspection", 3), ("annual_service", 12)]),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trane_cvhe_is_case_insensitive() {
        let m = match_profile("TRANE CVHE-500 Chiller #2", "Chiller");
        assert_eq!(m.label, "trane_cvhe");
        assert_eq!(m.profile.failure_modes.len(), 5);
        assert_eq!(m.profile.manufacturer.as_deref(), Some("Trane"));
    }

    #[test]
    fn test_brand_needs_both_patterns() {
        // Trane without a CVHE model falls through to the type rule
        assert_eq!(match_profile("Trane IntelliPak", "chiller").label, "chiller");
    }

    #[test]
    fn test_type_rules() {
        assert_eq!(match_profile("AHU-3 East Wing", "").label, "ahu");
        assert_eq!(match_profile("Main unit", "Air Handler").label, "ahu");
        assert_eq!(match_profile("RTU-12", "packaged").label, "rtu");
        assert_eq!(match_profile("Boiler 1", "heating").label, "boiler");
        assert_eq!(match_profile("CT-1", "cooling tower").label, "cooling_tower");
        assert_eq!(match_profile("CHWP-2", "pump").label, "pump");
        assert_eq!(match_profile("EF-4", "exhaust fan").label, "fan");
    }

    #[test]
    fn test_unmatched_falls_back_to_generic() {
        let m = match_profile("Widget 9000", "mystery");
        assert_eq!(m.label, "generic");
        assert!(m.profile.typical_life_years > 0.0);
        let m = match_profile("", "");
        assert_eq!(m.label, "generic");
    }

    #[test]
    fn test_every_profile_is_well_formed() {
        let mut profiles: Vec<EquipmentFailureProfile> = RULES.iter().map(|r| (r.build)()).collect();
        profiles.push(generic());
        for p in profiles {
            assert!(p.typical_life_years > 0.0, "{}", p.equipment_type);
            assert!(!p.failure_modes.is_empty());
            let total: f64 = p.failure_modes.iter().map(|m| m.probability).sum();
            assert!((total - 1.0).abs() < 1e-9, "{} mode probabilities sum to {total}", p.equipment_type);
            for m in &p.failure_modes {
                assert!(m.cost_range[0] <= m.cost_range[1]);
                assert!(!m.symptoms.is_empty());
            }
        }
    }
}
