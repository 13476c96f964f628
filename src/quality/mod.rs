//! Data Quality Scorer
//!
//! Rates how much supporting evidence exists for a diagnosis. Each
//! supplemental data source gets a quality tier from its record count, the
//! tiers are mapped to scores, and the scores are combined with the
//! configured per-source weights into one overall confidence.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{QualityConfig, TierBreakpoints};

// ============================================================================
// Sources & tiers
// ============================================================================

/// The six evidence sources that feed the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    SensorReadings,
    ManualMaintenanceLogs,
    RefrigerantReports,
    VibrationAnalysis,
    CondenserMaintenance,
    MaintenanceHistory,
}

impl DataSource {
    pub const ALL: [DataSource; 6] = [
        DataSource::SensorReadings,
        DataSource::ManualMaintenanceLogs,
        DataSource::RefrigerantReports,
        DataSource::VibrationAnalysis,
        DataSource::CondenserMaintenance,
        DataSource::MaintenanceHistory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataSource::SensorReadings => "sensor_readings",
            DataSource::ManualMaintenanceLogs => "manual_maintenance_logs",
            DataSource::RefrigerantReports => "refrigerant_reports",
            DataSource::VibrationAnalysis => "vibration_analysis",
            DataSource::CondenserMaintenance => "condenser_maintenance",
            DataSource::MaintenanceHistory => "maintenance_history",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSource::ALL
            .into_iter()
            .find(|src| src.name() == s)
            .ok_or_else(|| format!("unknown data source '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    /// Tier for a record count against a source's breakpoints.
    pub fn from_count(count: u32, bp: TierBreakpoints) -> Self {
        if count >= bp.excellent {
            QualityTier::Excellent
        } else if count >= bp.good {
            QualityTier::Good
        } else if bp.fair.is_some_and(|fair| count >= fair) {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }

    /// Completeness bucket for an overall confidence.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            QualityTier::Excellent
        } else if confidence >= 0.6 {
            QualityTier::Good
        } else if confidence >= 0.4 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityTier::Poor => "poor",
            QualityTier::Fair => "fair",
            QualityTier::Good => "good",
            QualityTier::Excellent => "excellent",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Assessment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceQuality {
    pub count: u32,
    pub quality: QualityTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityAssessment {
    /// Keyed by source name
    pub per_source: BTreeMap<String, SourceQuality>,
    /// 0.0 – 1.0
    pub overall_confidence: f64,
    pub completeness: QualityTier,
}

/// Scores source counts against the configured weights and breakpoints.
#[derive(Debug, Clone, Default)]
pub struct DataQualityScorer {
    config: QualityConfig,
}

impl DataQualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Assess the given per-source record counts. Sources that are absent
    /// from `counts` are scored as zero records.
    pub fn assess(&self, counts: &BTreeMap<DataSource, u32>) -> DataQualityAssessment {
        let weights = self.config.weights.entries();
        let breakpoints = self.config.breakpoints.entries();
        let scores = &self.config.tier_scores;

        let mut per_source = BTreeMap::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for (i, source) in DataSource::ALL.into_iter().enumerate() {
            let count = counts.get(&source).copied().unwrap_or(0);
            let quality = QualityTier::from_count(count, breakpoints[i].1);
            let score = match quality {
                QualityTier::Excellent => scores.excellent,
                QualityTier::Good => scores.good,
                QualityTier::Fair => scores.fair,
                QualityTier::Poor => scores.poor,
            };
            let weight = weights[i].1;
            weighted += score * weight;
            total_weight += weight;
            per_source.insert(source.name().to_string(), SourceQuality { count, quality });
        }

        let overall_confidence = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let completeness = QualityTier::from_confidence(overall_confidence);

        debug!(
            overall_confidence,
            completeness = %completeness,
            "Assessed data quality"
        );

        DataQualityAssessment { per_source, overall_confidence, completeness }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> DataQualityScorer {
        DataQualityScorer::new(QualityConfig::default())
    }

    fn counts(values: [u32; 6]) -> BTreeMap<DataSource, u32> {
        DataSource::ALL.into_iter().zip(values).collect()
    }

    #[test]
    fn test_tier_breakpoints() {
        let sensor = TierBreakpoints::new(20, 10, Some(5));
        assert_eq!(QualityTier::from_count(20, sensor), QualityTier::Excellent);
        assert_eq!(QualityTier::from_count(19, sensor), QualityTier::Good);
        assert_eq!(QualityTier::from_count(5, sensor), QualityTier::Fair);
        assert_eq!(QualityTier::from_count(4, sensor), QualityTier::Poor);

        // Vibration has no fair tier
        let vibration = TierBreakpoints::new(2, 1, None);
        assert_eq!(QualityTier::from_count(1, vibration), QualityTier::Good);
        assert_eq!(QualityTier::from_count(0, vibration), QualityTier::Poor);
    }

    #[test]
    fn test_all_excellent_is_full_confidence() {
        let a = scorer().assess(&counts([20, 10, 3, 2, 3, 24]));
        assert!((a.overall_confidence - 1.0).abs() < 1e-12);
        assert_eq!(a.completeness, QualityTier::Excellent);
        assert!(a.per_source.values().all(|s| s.quality == QualityTier::Excellent));
    }

    #[test]
    fn test_no_data_is_poor() {
        let a = scorer().assess(&BTreeMap::new());
        assert!((a.overall_confidence - 0.3).abs() < 1e-12);
        assert_eq!(a.completeness, QualityTier::Poor);
        assert_eq!(a.per_source.len(), 6);
        assert_eq!(a.per_source["vibration_analysis"].count, 0);
    }

    #[test]
    fn test_weighted_mix() {
        // sensor excellent (0.25·1.0), manual good (0.20·0.8), others poor (0.55·0.3)
        let a = scorer().assess(&counts([25, 5, 0, 0, 0, 0]));
        let expected = 0.25 + 0.20 * 0.8 + 0.55 * 0.3;
        assert!((a.overall_confidence - expected).abs() < 1e-12);
        assert_eq!(a.completeness, QualityTier::Fair);
    }

    #[test]
    fn test_confidence_always_bounded() {
        let s = scorer();
        for n in [0, 1, 2, 5, 10, 50, u32::MAX] {
            let a = s.assess(&counts([n; 6]));
            assert!((0.0..=1.0).contains(&a.overall_confidence));
        }
    }

    #[test]
    fn test_source_names_round_trip() {
        for src in DataSource::ALL {
            assert_eq!(src.name().parse::<DataSource>(), Ok(src));
        }
        assert!("telemetry".parse::<DataSource>().is_err());
    }
}
