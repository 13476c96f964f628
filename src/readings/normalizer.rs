//! Reading Normalizer
//!
//! Merges live sensor readings and readings derived from maintenance checks
//! into one typed reading set according to a `ReadingSourcePreference`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{Reading, ReadingSourcePreference};

/// Merge the two reading sources.
///
/// - `ManualOnly`: `manual` if non-empty, else `derived` (never both)
/// - `StandardOnly`: `derived` if non-empty, else `manual`
/// - `Auto`: union of both; a derived reading whose
///   `(equipment_id, sensor_type, timestamp)` already exists among the manual
///   readings is dropped
///
/// The result is always sorted by timestamp ascending and never contains two
/// readings with the same key (the first occurrence wins).
pub fn merge(
    manual: &[Reading],
    derived: &[Reading],
    preference: ReadingSourcePreference,
) -> Vec<Reading> {
    let chosen: Vec<&Reading> = match preference {
        ReadingSourcePreference::ManualOnly => {
            if manual.is_empty() {
                derived.iter().collect()
            } else {
                manual.iter().collect()
            }
        }
        ReadingSourcePreference::StandardOnly => {
            if derived.is_empty() {
                manual.iter().collect()
            } else {
                derived.iter().collect()
            }
        }
        // Manual first so that manual readings win key collisions
        ReadingSourcePreference::Auto => manual.iter().chain(derived.iter()).collect(),
    };

    let mut seen: HashSet<(&str, &str, DateTime<Utc>)> = HashSet::with_capacity(chosen.len());
    let mut merged: Vec<Reading> = Vec::with_capacity(chosen.len());
    let mut dropped = 0usize;

    for reading in chosen {
        if seen.insert(reading.key()) {
            merged.push(reading.clone());
        } else {
            dropped += 1;
        }
    }

    // Stable sort keeps manual-before-derived order for equal timestamps
    merged.sort_by_key(|r| r.timestamp);

    debug!(
        preference = %preference,
        manual = manual.len(),
        derived = derived.len(),
        merged = merged.len(),
        dropped_duplicates = dropped,
        "Merged reading sources"
    );

    merged
}

/// Most recent reading for each sensor type, ordered by sensor type.
pub fn latest_per_sensor(readings: &[Reading]) -> Vec<Reading> {
    let mut latest: std::collections::BTreeMap<&str, &Reading> = std::collections::BTreeMap::new();
    for r in readings {
        latest
            .entry(r.sensor_type.as_str())
            .and_modify(|cur| {
                if r.timestamp > cur.timestamp {
                    *cur = r;
                }
            })
            .or_insert(r);
    }
    latest.into_values().cloned().collect()
}

/// Split readings into the history before each sensor's latest reading and
/// the latest readings themselves (as `latest_per_sensor`).
///
/// Baselines are built from the history half so that a reading is never
/// scored against statistics that include it.
pub fn split_latest(readings: &[Reading]) -> (Vec<Reading>, Vec<Reading>) {
    let current = latest_per_sensor(readings);
    let cutoffs: std::collections::HashMap<&str, DateTime<Utc>> =
        current.iter().map(|r| (r.sensor_type.as_str(), r.timestamp)).collect();
    let history = readings
        .iter()
        .filter(|r| cutoffs.get(r.sensor_type.as_str()).is_some_and(|latest| r.timestamp < *latest))
        .cloned()
        .collect();
    (history, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingSource;
    use chrono::{Duration, TimeZone};

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn live(sensor: &str, value: f64, hour: i64) -> Reading {
        Reading::new("AHU-1", sensor, value, "°F", ts(hour), ReadingSource::LiveSensor)
    }

    fn derived(sensor: &str, value: f64, hour: i64) -> Reading {
        Reading::new("AHU-1", sensor, value, "°F", ts(hour), ReadingSource::DerivedFromCheck)
    }

    #[test]
    fn test_manual_only_prefers_manual() {
        let m = vec![live("supply_air_temperature", 55.0, 1)];
        let d = vec![derived("supply_air_temperature", 56.0, 2)];
        let out = merge(&m, &d, ReadingSourcePreference::ManualOnly);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, ReadingSource::LiveSensor);
    }

    #[test]
    fn test_manual_only_falls_back_to_derived() {
        let d = vec![derived("supply_air_temperature", 56.0, 2)];
        let out = merge(&[], &d, ReadingSourcePreference::ManualOnly);
        assert_eq!(out, d);
    }

    #[test]
    fn test_standard_only_prefers_derived_and_falls_back() {
        let m = vec![live("supply_air_temperature", 55.0, 1)];
        let d = vec![derived("supply_air_temperature", 56.0, 2)];
        let out = merge(&m, &d, ReadingSourcePreference::StandardOnly);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, ReadingSource::DerivedFromCheck);

        let out = merge(&m, &[], ReadingSourcePreference::StandardOnly);
        assert_eq!(out, m);
    }

    #[test]
    fn test_auto_manual_wins_ties() {
        let m = vec![live("supply_air_temperature", 55.0, 3)];
        let d = vec![
            derived("supply_air_temperature", 99.0, 3),
            derived("supply_air_temperature", 57.0, 1),
        ];
        let out = merge(&m, &d, ReadingSourcePreference::Auto);
        assert_eq!(out.len(), 2);
        // Sorted ascending
        assert_eq!(out[0].timestamp, ts(1));
        assert_eq!(out[1].timestamp, ts(3));
        assert_eq!(out[1].value, 55.0);
        assert_eq!(out[1].source, ReadingSource::LiveSensor);
    }

    #[test]
    fn test_auto_never_contains_duplicate_keys() {
        // Duplicates inside each input as well as across inputs
        let m = vec![
            live("motor_current", 20.0, 1),
            live("motor_current", 21.0, 1),
            live("vibration", 0.1, 1),
        ];
        let d = vec![
            derived("motor_current", 22.0, 1),
            derived("vibration", 0.2, 1),
            derived("vibration", 0.3, 2),
            derived("vibration", 0.4, 2),
        ];
        let out = merge(&m, &d, ReadingSourcePreference::Auto);
        let keys: HashSet<_> = out.iter().map(Reading::key).collect();
        assert_eq!(keys.len(), out.len());
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_both_empty() {
        for pref in [
            ReadingSourcePreference::Auto,
            ReadingSourcePreference::ManualOnly,
            ReadingSourcePreference::StandardOnly,
        ] {
            assert!(merge(&[], &[], pref).is_empty());
        }
    }

    #[test]
    fn test_latest_per_sensor() {
        let readings = vec![
            live("vibration", 0.1, 1),
            live("vibration", 0.3, 5),
            live("motor_current", 20.0, 2),
            live("vibration", 0.2, 3),
        ];
        let latest = latest_per_sensor(&readings);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].sensor_type, "motor_current");
        assert_eq!(latest[1].sensor_type, "vibration");
        assert_eq!(latest[1].value, 0.3);
    }

    #[test]
    fn test_split_latest_excludes_scored_readings() {
        let readings = vec![
            live("vibration", 0.1, 1),
            live("vibration", 0.3, 5),
            live("motor_current", 20.0, 2),
            live("vibration", 0.2, 3),
            live("motor_current", 21.0, 4),
        ];
        let (history, current) = split_latest(&readings);
        assert_eq!(current, latest_per_sensor(&readings));
        assert_eq!(history.len(), 3);
        for r in &current {
            assert!(!history.contains(r), "{r:?} is both history and current");
        }
        assert!(history.iter().all(|r| r.timestamp < ts(5)));
    }

    #[test]
    fn test_split_latest_single_reading_has_no_history() {
        let (history, current) = split_latest(&[live("vibration", 0.4, 1)]);
        assert!(history.is_empty());
        assert_eq!(current.len(), 1);
    }
}
