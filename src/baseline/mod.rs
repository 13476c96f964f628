//! Statistical Baseline Engine - per-parameter baselines & seasonal z-score anomalies
//!
//! Baselines are recomputed from the available reading history on every
//! analysis run; nothing is cached between runs.
//!
//! ## Architecture
//!
//! - `RunningStats`: Welford accumulator (mean / Bessel-corrected variance)
//! - `StatisticalBaseline`: mean, stddev and 12 monthly seasonal factors for one parameter
//! - `BaselineEngine`: builds baselines and scores current readings against them
//!
//! ## Usage
//!
//! ```ignore
//! let engine = BaselineEngine::new(config.baseline.clone());
//! let baselines = engine.compute_baselines(&history);
//! let findings = engine.detect_anomalies(&current, &baselines);
//! ```
//!
//! A parameter with fewer than `min_samples` readings has no baseline. Callers
//! must treat that as "cannot score", not as "no anomaly".

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BaselineConfig;
use crate::types::Reading;

// ============================================================================
// Running statistics
// ============================================================================

/// Welford's online algorithm for numerically stable mean/variance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunningStats {
    pub count: usize,
    pub mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Add a sample. Non-finite values are rejected so a single NaN cannot
    /// poison the accumulator. Returns whether the sample was accepted.
    pub fn add(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        true
    }

    /// Sample variance with Bessel's correction (`n - 1` denominator).
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

// ============================================================================
// Baselines
// ============================================================================

/// Historical profile of one sensor parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalBaseline {
    /// Sensor type this baseline describes
    pub parameter: String,
    pub mean: f64,
    pub stddev: f64,
    pub sample_size: usize,
    /// Month (0 = January … 11 = December) → multiplicative factor on `mean`
    pub seasonal_factors: BTreeMap<u32, f64>,
    pub computed_at: DateTime<Utc>,
}

impl StatisticalBaseline {
    /// Seasonal factor for a zero-based month; 1.0 if absent.
    pub fn seasonal_factor(&self, month0: u32) -> f64 {
        self.seasonal_factors.get(&month0).copied().unwrap_or(1.0)
    }

    /// Baseline mean adjusted for the month of `at`.
    pub fn adjusted_mean(&self, at: DateTime<Utc>) -> f64 {
        self.mean * self.seasonal_factor(at.month0())
    }
}

// ============================================================================
// Anomaly findings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalySeverity::Low => write!(f, "low"),
            AnomalySeverity::Medium => write!(f, "medium"),
            AnomalySeverity::High => write!(f, "high"),
        }
    }
}

/// A reading that deviates from its seasonally adjusted baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub parameter: String,
    pub observed_value: f64,
    pub seasonally_adjusted_mean: f64,
    pub z_score: f64,
    pub severity: AnomalySeverity,
    /// 0.0 – `confidence_cap`
    pub confidence: f64,
}

// ============================================================================
// Engine
// ============================================================================

/// Builds baselines and scores readings. Holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct BaselineEngine {
    config: BaselineConfig,
}

impl BaselineEngine {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Compute baselines from the reading history, stamped with the current time.
    pub fn compute_baselines(&self, history: &[Reading]) -> BTreeMap<String, StatisticalBaseline> {
        self.compute_baselines_at(history, Utc::now())
    }

    /// Compute one baseline per sensor type with at least `min_samples` finite values.
    pub fn compute_baselines_at(
        &self,
        history: &[Reading],
        computed_at: DateTime<Utc>,
    ) -> BTreeMap<String, StatisticalBaseline> {
        struct Group {
            overall: RunningStats,
            monthly: [RunningStats; 12],
        }

        let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
        for r in history {
            let group = groups.entry(r.sensor_type.as_str()).or_insert_with(|| Group {
                overall: RunningStats::default(),
                monthly: [RunningStats::default(); 12],
            });
            if group.overall.add(r.value) {
                group.monthly[r.timestamp.month0() as usize].add(r.value);
            }
        }

        let mut baselines = BTreeMap::new();
        for (parameter, group) in groups {
            let n = group.overall.count;
            if n < self.config.min_samples {
                debug!(
                    parameter,
                    samples = n,
                    required = self.config.min_samples,
                    "Baseline unavailable, insufficient samples"
                );
                continue;
            }

            let mean = group.overall.mean;
            let seasonal_factors = (0u32..12)
                .map(|m| {
                    let month = &group.monthly[m as usize];
                    let factor = if month.count == 0 || mean.abs() < f64::EPSILON {
                        1.0
                    } else {
                        month.mean / mean
                    };
                    (m, factor)
                })
                .collect();

            baselines.insert(
                parameter.to_string(),
                StatisticalBaseline {
                    parameter: parameter.to_string(),
                    mean,
                    stddev: group.overall.std_dev(),
                    sample_size: n,
                    seasonal_factors,
                    computed_at,
                },
            );
        }

        baselines
    }

    /// Score current readings against their baselines.
    ///
    /// Readings without a baseline, or whose baseline has zero (or non-finite)
    /// stddev, are skipped. Only `|z| >= low_z` is reported.
    pub fn detect_anomalies(
        &self,
        current: &[Reading],
        baselines: &BTreeMap<String, StatisticalBaseline>,
    ) -> Vec<AnomalyFinding> {
        current
            .iter()
            .filter_map(|reading| {
                let baseline = baselines.get(&reading.sensor_type)?;
                if !(baseline.stddev.is_finite() && baseline.stddev > 0.0) || !reading.value.is_finite() {
                    return None;
                }
                let adjusted_mean = baseline.adjusted_mean(reading.timestamp);
                let z = (reading.value - adjusted_mean) / baseline.stddev;
                let severity = self.severity_for(z.abs())?;
                Some(AnomalyFinding {
                    parameter: reading.sensor_type.clone(),
                    observed_value: reading.value,
                    seasonally_adjusted_mean: adjusted_mean,
                    z_score: z,
                    severity,
                    confidence: self.confidence_for(baseline.sample_size, z.abs()),
                })
            })
            .collect()
    }

    /// Severity bucket for an absolute z-score; `None` below the reporting floor.
    pub fn severity_for(&self, abs_z: f64) -> Option<AnomalySeverity> {
        if abs_z >= self.config.high_z {
            Some(AnomalySeverity::High)
        } else if abs_z >= self.config.medium_z {
            Some(AnomalySeverity::Medium)
        } else if abs_z >= self.config.low_z {
            Some(AnomalySeverity::Low)
        } else {
            None
        }
    }

    /// `min(cap, base + n / sample_divisor + |z| / z_divisor)`
    pub fn confidence_for(&self, sample_size: usize, abs_z: f64) -> f64 {
        let c = &self.config;
        (c.confidence_base
            + sample_size as f64 / c.confidence_sample_divisor
            + abs_z / c.confidence_z_divisor)
            .min(c.confidence_cap)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingSource;
    use chrono::TimeZone;

    fn reading(sensor: &str, value: f64, month: u32, day: u32) -> Reading {
        Reading::new(
            "CH-1",
            sensor,
            value,
            "°F",
            Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap(),
            ReadingSource::LiveSensor,
        )
    }

    fn engine() -> BaselineEngine {
        BaselineEngine::new(BaselineConfig::default())
    }

    #[test]
    fn test_welford_bessel() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.add(v);
        }
        assert!((stats.mean - 5.0).abs() < 1e-9);
        // Sum of squared deviations = 32, n-1 = 7
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_running_stats_rejects_nan() {
        let mut stats = RunningStats::default();
        assert!(stats.add(1.0));
        assert!(!stats.add(f64::NAN));
        assert!(!stats.add(f64::INFINITY));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.variance(), 0.0);
    }

    #[test]
    fn test_baseline_requires_min_samples() {
        let history: Vec<Reading> = (1..=9).map(|d| reading("vibration", 0.1, 1, d)).collect();
        assert!(engine().compute_baselines(&history).is_empty());

        let history: Vec<Reading> = (1..=10).map(|d| reading("vibration", 0.1, 1, d)).collect();
        let baselines = engine().compute_baselines(&history);
        let b = &baselines["vibration"];
        assert_eq!(b.sample_size, 10);
        assert!(b.stddev >= 0.0);
    }

    #[test]
    fn test_seasonal_factors() {
        // 10 January readings at 40, 10 July readings at 60 → mean 50
        let mut history: Vec<Reading> = (1..=10).map(|d| reading("return_air_temperature", 40.0, 1, d)).collect();
        history.extend((1..=10).map(|d| reading("return_air_temperature", 60.0, 7, d)));

        let baselines = engine().compute_baselines(&history);
        let b = &baselines["return_air_temperature"];
        assert!((b.mean - 50.0).abs() < 1e-9);
        assert!((b.seasonal_factor(0) - 0.8).abs() < 1e-9);
        assert!((b.seasonal_factor(6) - 1.2).abs() < 1e-9);
        // Months without data get no adjustment
        assert_eq!(b.seasonal_factor(3), 1.0);
        assert_eq!(b.seasonal_factors.len(), 12);
    }

    #[test]
    fn test_z_score_uses_adjusted_mean() {
        let mut history: Vec<Reading> = (1..=10).map(|d| reading("return_air_temperature", 40.0, 1, d)).collect();
        history.extend((1..=10).map(|d| reading("return_air_temperature", 60.0, 7, d)));
        let e = engine();
        let baselines = e.compute_baselines(&history);
        let b = &baselines["return_air_temperature"];

        let current = reading("return_air_temperature", 90.0, 7, 20);
        let findings = e.detect_anomalies(std::slice::from_ref(&current), &baselines);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        let adjusted = b.mean * b.seasonal_factor(6);
        assert_eq!(f.seasonally_adjusted_mean, adjusted);
        assert_eq!(f.z_score, (90.0 - adjusted) / b.stddev);
    }

    #[test]
    fn test_spike_in_month_without_history_is_high() {
        // 40 June readings alternating 99/101, then the first July reading
        let history: Vec<Reading> = (1..=20)
            .flat_map(|d| [reading("bearing_temperature", 99.0, 6, d), reading("bearing_temperature", 101.0, 6, d)])
            .collect();
        let e = engine();
        let baselines = e.compute_baselines(&history);

        let findings = e.detect_anomalies(&[reading("bearing_temperature", 180.0, 7, 1)], &baselines);
        assert_eq!(findings.len(), 1);
        assert!((findings[0].seasonally_adjusted_mean - 100.0).abs() < 1e-9);
        assert!(findings[0].z_score > 3.0);
        assert_eq!(findings[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_spike_on_minimal_history_is_high() {
        let history: Vec<Reading> = (1..=10)
            .map(|d| reading("bearing_temperature", if d % 2 == 0 { 99.0 } else { 101.0 }, 3, d))
            .collect();
        let e = engine();
        let baselines = e.compute_baselines(&history);
        assert_eq!(baselines["bearing_temperature"].sample_size, 10);

        let findings = e.detect_anomalies(&[reading("bearing_temperature", 110.0, 3, 20)], &baselines);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_constant_signal_is_skipped() {
        let history: Vec<Reading> = (1..=12).map(|d| reading("oil_pressure", 50.0, 2, d)).collect();
        let e = engine();
        let baselines = e.compute_baselines(&history);
        assert_eq!(baselines["oil_pressure"].stddev, 0.0);
        let findings = e.detect_anomalies(&[reading("oil_pressure", 10.0, 2, 20)], &baselines);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_baseline_means_no_finding() {
        let findings = engine().detect_anomalies(&[reading("vibration", 9.9, 1, 1)], &BTreeMap::new());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_severity_thresholds() {
        let e = engine();
        assert_eq!(e.severity_for(1.49), None);
        assert_eq!(e.severity_for(1.5), Some(AnomalySeverity::Low));
        assert_eq!(e.severity_for(2.0), Some(AnomalySeverity::Medium));
        assert_eq!(e.severity_for(2.99), Some(AnomalySeverity::Medium));
        assert_eq!(e.severity_for(3.0), Some(AnomalySeverity::High));
    }

    #[test]
    fn test_severity_monotonic_in_abs_z() {
        let e = engine();
        let mut last: Option<AnomalySeverity> = None;
        for i in 0..100 {
            let sev = e.severity_for(f64::from(i) * 0.05);
            assert!(sev >= last, "severity decreased at |z| = {}", f64::from(i) * 0.05);
            last = sev;
        }
    }

    #[test]
    fn test_confidence_formula_and_cap() {
        let e = engine();
        assert!((e.confidence_for(10, 2.0) - 0.8).abs() < 1e-9);
        assert_eq!(e.confidence_for(1000, 10.0), 0.95);
    }
}
