//! Tiered Maintenance Policy Engine
//!
//! Local, non-AI diagnosis. Combines two complementary violation checks with
//! how recently each check cadence was performed:
//!
//! 1. Frequency snapshot over the most recent checks
//! 2. Violations: static template thresholds/normal range on the latest
//!    reading per sensor, plus statistical anomalies (high → critical,
//!    medium → warning)
//! 3. Limited data (< 3 daily and < 2 weekly checks): every violation drops
//!    one level and is marked as such
//! 4. Action: critical → immediate inspection, warning → weekly inspection,
//!    monthly overdue with limited data → increase monitoring, else continue
//!
//! The engine never fails. No readings at all yields the no-data result.

pub mod frequency;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::baseline::{AnomalyFinding, AnomalySeverity};
use crate::config::{DiagnosticsConfig, PolicyConfig, SensorTemplate, ThresholdDirection};
use crate::readings::latest_per_sensor;
use crate::types::{DiagnosticResult, MaintenanceCheck, Reading, RiskLevel, WorkOrder, WorkOrderPriority};

pub use frequency::MaintenanceFrequencySnapshot;

// ============================================================================
// Violations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationLevel {
    Normal,
    Warning,
    Critical,
}

impl ViolationLevel {
    fn downgraded(self) -> Self {
        match self {
            ViolationLevel::Critical => ViolationLevel::Warning,
            ViolationLevel::Warning | ViolationLevel::Normal => ViolationLevel::Normal,
        }
    }
}

impl fmt::Display for ViolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationLevel::Normal => write!(f, "normal"),
            ViolationLevel::Warning => write!(f, "warning"),
            ViolationLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Which check produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationOrigin {
    Threshold,
    Statistical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub sensor_type: String,
    pub value: f64,
    pub level: ViolationLevel,
    pub origin: ViolationOrigin,
    pub message: String,
}

/// Level of a single reading against its template.
pub fn template_level(template: &SensorTemplate, value: f64) -> ViolationLevel {
    let (beyond_critical, beyond_warning) = match template.direction {
        ThresholdDirection::Above => (value >= template.critical, value >= template.warning),
        ThresholdDirection::Below => (value <= template.critical, value <= template.warning),
    };
    if beyond_critical {
        ViolationLevel::Critical
    } else if beyond_warning || value < template.normal_min || value > template.normal_max {
        ViolationLevel::Warning
    } else {
        ViolationLevel::Normal
    }
}

// ============================================================================
// Decision
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    ImmediateDetailedInspection,
    WeeklyInspectionRecommended,
    IncreaseMonitoringFrequency,
    ContinueCurrentSchedule,
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaintenanceAction::ImmediateDetailedInspection => "immediate_detailed_inspection",
            MaintenanceAction::WeeklyInspectionRecommended => "weekly_inspection_recommended",
            MaintenanceAction::IncreaseMonitoringFrequency => "increase_monitoring_frequency",
            MaintenanceAction::ContinueCurrentSchedule => "continue_current_schedule",
        };
        f.write_str(s)
    }
}

/// Everything the policy decided for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: MaintenanceAction,
    pub violations: Vec<Violation>,
    pub snapshot: MaintenanceFrequencySnapshot,
    pub limited_data: bool,
    pub result: DiagnosticResult,
}

/// Inputs to one policy evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub equipment_id: &'a str,
    /// Merged readings (any order)
    pub readings: &'a [Reading],
    pub anomalies: &'a [AnomalyFinding],
    pub checks: &'a [MaintenanceCheck],
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TieredPolicyEngine {
    config: PolicyConfig,
    templates: Vec<SensorTemplate>,
}

impl TieredPolicyEngine {
    pub fn new(config: PolicyConfig, templates: Vec<SensorTemplate>) -> Self {
        Self { config, templates }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self::new(config.policy.clone(), config.templates.clone())
    }

    pub fn evaluate(&self, input: PolicyInput<'_>) -> PolicyDecision {
        let snapshot = MaintenanceFrequencySnapshot::from_checks(input.checks, input.now, &self.config);
        let limited_data = snapshot.has_limited_data(&self.config);

        if input.readings.is_empty() {
            info!(equipment_id = input.equipment_id, "No readings, returning no-data result");
            return PolicyDecision {
                action: MaintenanceAction::ContinueCurrentSchedule,
                violations: Vec::new(),
                snapshot,
                limited_data,
                result: DiagnosticResult::no_data(input.equipment_id),
            };
        }

        let mut violations = self.collect_violations(input.readings, input.anomalies);
        if limited_data {
            let qualifier = format!(
                " (limited data: {} daily / {} weekly checks)",
                snapshot.daily_checks, snapshot.weekly_checks
            );
            for v in &mut violations {
                v.level = v.level.downgraded();
                v.message.push_str(&qualifier);
            }
        }

        let worst = violations.iter().map(|v| v.level).max().unwrap_or(ViolationLevel::Normal);
        let action = match worst {
            ViolationLevel::Critical => MaintenanceAction::ImmediateDetailedInspection,
            ViolationLevel::Warning => MaintenanceAction::WeeklyInspectionRecommended,
            ViolationLevel::Normal if snapshot.monthly_overdue && limited_data => {
                MaintenanceAction::IncreaseMonitoringFrequency
            }
            ViolationLevel::Normal => MaintenanceAction::ContinueCurrentSchedule,
        };

        let result = self.compose_result(input.equipment_id, action, &violations, &snapshot, limited_data);

        info!(
            equipment_id = input.equipment_id,
            action = %action,
            violations = violations.iter().filter(|v| v.level > ViolationLevel::Normal).count(),
            limited_data,
            "Tiered policy decision"
        );

        PolicyDecision { action, violations, snapshot, limited_data, result }
    }

    /// Worst violation per sensor across the threshold and statistical checks.
    fn collect_violations(&self, readings: &[Reading], anomalies: &[AnomalyFinding]) -> Vec<Violation> {
        let mut worst: BTreeMap<String, Violation> = BTreeMap::new();
        // Ties keep the earlier (threshold) violation
        let mut keep_worse = |v: Violation| {
            if worst.get(&v.sensor_type).map_or(true, |existing| v.level > existing.level) {
                worst.insert(v.sensor_type.clone(), v);
            }
        };

        for reading in latest_per_sensor(readings) {
            let Some(template) = self.templates.iter().find(|t| t.sensor_type == reading.sensor_type) else {
                continue;
            };
            let level = template_level(template, reading.value);
            if level == ViolationLevel::Normal {
                continue;
            }
            let message = format!(
                "{} at {:.2} {} is {} (normal {:.2}–{:.2}, warning {:.2}, critical {:.2})",
                reading.sensor_type,
                reading.value,
                template.unit,
                level,
                template.normal_min,
                template.normal_max,
                template.warning,
                template.critical
            );
            keep_worse(Violation {
                sensor_type: reading.sensor_type.clone(),
                value: reading.value,
                level,
                origin: ViolationOrigin::Threshold,
                message,
            });
        }

        for a in anomalies {
            let level = match a.severity {
                AnomalySeverity::High => ViolationLevel::Critical,
                AnomalySeverity::Medium => ViolationLevel::Warning,
                AnomalySeverity::Low => continue,
            };
            keep_worse(Violation {
                sensor_type: a.parameter.clone(),
                value: a.observed_value,
                level,
                origin: ViolationOrigin::Statistical,
                message: format!(
                    "{} at {:.2} deviates {:+.1}σ from its seasonal baseline {:.2}",
                    a.parameter, a.observed_value, a.z_score, a.seasonally_adjusted_mean
                ),
            });
        }

        worst.into_values().collect()
    }

    fn compose_result(
        &self,
        equipment_id: &str,
        action: MaintenanceAction,
        violations: &[Violation],
        snapshot: &MaintenanceFrequencySnapshot,
        limited_data: bool,
    ) -> DiagnosticResult {
        let active: Vec<&str> = violations
            .iter()
            .filter(|v| v.level > ViolationLevel::Normal)
            .map(|v| v.message.as_str())
            .collect();

        let mut finding = if active.is_empty() {
            "All monitored parameters are within their normal operating ranges.".to_string()
        } else {
            active.join("; ")
        };
        let overdue = snapshot.overdue_cadences();
        if !overdue.is_empty() {
            finding.push_str(&format!(" Overdue checks: {}.", overdue.join(", ")));
        }
        if limited_data {
            finding.push_str(" Limited maintenance data; alert levels were reduced.");
        }

        let confidence_score = if limited_data {
            self.config.limited_data_confidence
        } else {
            self.config.sufficient_data_confidence
        };

        let (risk_level, recommendation, work_order) = match action {
            MaintenanceAction::ImmediateDetailedInspection => (
                RiskLevel::Critical,
                "Perform an immediate detailed inspection of the flagged components before continued operation.".to_string(),
                Some(WorkOrder {
                    title: format!("Immediate detailed inspection: {equipment_id}"),
                    description: finding.clone(),
                    priority: WorkOrderPriority::High,
                    due_hours: self.config.critical_due_hours,
                    assigned_team: self.config.critical_team.clone(),
                }),
            ),
            MaintenanceAction::WeeklyInspectionRecommended => (
                RiskLevel::Medium,
                "Schedule an inspection within the week and review the flagged parameters.".to_string(),
                Some(WorkOrder {
                    title: format!("Inspection recommended: {equipment_id}"),
                    description: finding.clone(),
                    priority: WorkOrderPriority::Medium,
                    due_hours: self.config.warning_due_hours,
                    assigned_team: self.config.warning_team.clone(),
                }),
            ),
            MaintenanceAction::IncreaseMonitoringFrequency => (
                RiskLevel::Low,
                "Increase monitoring frequency: record daily and weekly checks to build a reliable history.".to_string(),
                None,
            ),
            MaintenanceAction::ContinueCurrentSchedule => (
                RiskLevel::Low,
                "Continue the current maintenance schedule.".to_string(),
                None,
            ),
        };

        DiagnosticResult {
            asset_id: equipment_id.to_string(),
            risk_level,
            finding,
            recommendation,
            confidence_score,
            create_work_order: work_order.is_some(),
            work_order,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
