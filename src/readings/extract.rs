//! Check-derived readings
//!
//! Turns the numeric columns of maintenance-check forms into typed readings.
//! Column names vary by equipment type; known aliases map onto canonical
//! sensor types so they line up with live sensor streams and templates.

use tracing::debug;

use crate::types::{MaintenanceCheck, Reading, ReadingSource};

/// `(column alias, canonical sensor type, unit)`
const COLUMN_MAP: &[(&str, &str, &str)] = &[
    ("supply_air_temp", "supply_air_temperature", "°F"),
    ("supply_air_temperature", "supply_air_temperature", "°F"),
    ("sat", "supply_air_temperature", "°F"),
    ("return_air_temp", "return_air_temperature", "°F"),
    ("return_air_temperature", "return_air_temperature", "°F"),
    ("rat", "return_air_temperature", "°F"),
    ("discharge_pressure", "discharge_pressure", "psi"),
    ("head_pressure", "discharge_pressure", "psi"),
    ("suction_pressure", "suction_pressure", "psi"),
    ("amp_draw", "motor_current", "A"),
    ("amps", "motor_current", "A"),
    ("motor_amps", "motor_current", "A"),
    ("motor_current", "motor_current", "A"),
    ("vibration", "vibration", "in/s"),
    ("vibration_ips", "vibration", "in/s"),
    ("filter_dp", "filter_pressure_drop", "inWC"),
    ("filter_pressure_drop", "filter_pressure_drop", "inWC"),
    ("chw_supply_temp", "chilled_water_supply_temperature", "°F"),
    ("chilled_water_supply_temp", "chilled_water_supply_temperature", "°F"),
    ("chw_return_temp", "chilled_water_return_temperature", "°F"),
    ("condenser_approach", "condenser_approach", "°F"),
    ("oil_pressure", "oil_pressure", "psi"),
    ("oil_temp", "oil_temperature", "°F"),
    ("refrigerant_level", "refrigerant_level", "%"),
    ("superheat", "superheat", "°F"),
    ("subcooling", "subcooling", "°F"),
];

/// Canonical sensor type and unit for a check column.
///
/// Unknown columns pass through under their own (normalized) name with an
/// empty unit.
pub fn canonical_column(column: &str) -> (String, String) {
    let normalized = column.trim().to_lowercase().replace([' ', '-'], "_");
    COLUMN_MAP
        .iter()
        .find(|(alias, _, _)| *alias == normalized)
        .map_or_else(
            || (normalized.clone(), String::new()),
            |(_, sensor, unit)| ((*sensor).to_string(), (*unit).to_string()),
        )
}

/// Extract readings from maintenance checks.
///
/// Every finite measurement becomes one `DerivedFromCheck` reading stamped
/// with the check's `performed_at`.
pub fn derive_readings(checks: &[MaintenanceCheck]) -> Vec<Reading> {
    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for check in checks {
        for (column, value) in &check.measurements {
            if !value.is_finite() {
                skipped += 1;
                continue;
            }
            let (sensor_type, unit) = canonical_column(column);
            readings.push(Reading {
                equipment_id: check.equipment_id.clone(),
                sensor_type,
                value: *value,
                unit,
                timestamp: check.performed_at,
                source: ReadingSource::DerivedFromCheck,
            });
        }
    }

    if skipped > 0 {
        debug!(skipped, "Dropped non-finite check measurements");
    }

    readings
}
