//! Terminal diagnosis types: RiskLevel, WorkOrder, DiagnosticResult

use serde::{Deserialize, Serialize};

/// Overall risk assessment for one asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Ordinal used for consensus averaging (low=1 … critical=4).
    pub fn ordinal(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Critical => 4,
        }
    }

    /// Bucket an averaged ordinal back into a level.
    ///
    /// `<= 1.5` low, `<= 2.5` medium, `<= 3.5` high, above that critical.
    pub fn from_average(avg: f64) -> Self {
        if avg <= 1.5 {
            RiskLevel::Low
        } else if avg <= 2.5 {
            RiskLevel::Medium
        } else if avg <= 3.5 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}

/// Work-order priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum WorkOrderPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for WorkOrderPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkOrderPriority::Low => write!(f, "low"),
            WorkOrderPriority::Medium => write!(f, "medium"),
            WorkOrderPriority::High => write!(f, "high"),
            WorkOrderPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Work order proposed alongside a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub title: String,
    pub description: String,
    pub priority: WorkOrderPriority,
    pub due_hours: u32,
    pub assigned_team: String,
}

/// Terminal output of one analysis run.
///
/// Produced either by the tiered policy engine or by the AI consensus path,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub asset_id: String,
    pub risk_level: RiskLevel,
    pub finding: String,
    pub recommendation: String,
    pub confidence_score: f64,
    pub create_work_order: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_order: Option<WorkOrder>,
}

impl DiagnosticResult {
    /// Result for an asset with no readings from any source.
    ///
    /// This is a terminal state, not an error.
    pub fn no_data(asset_id: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            risk_level: RiskLevel::Low,
            finding: "No data: no sensor readings or maintenance-check measurements are available for this equipment.".to_string(),
            recommendation: "Begin periodic data collection (daily and weekly checks with recorded measurements) to establish a baseline for predictive analysis.".to_string(),
            confidence_score: 0.0,
            create_work_order: false,
            work_order: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_bucketing() {
        assert_eq!(RiskLevel::from_average(1.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_average(1.5), RiskLevel::Low);
        assert_eq!(RiskLevel::from_average(2.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_average(2.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_average(3.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_average(3.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_average(4.0), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_parse_case_insensitive() {
        assert_eq!(" HIGH ".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert!("elevated".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_risk_serde_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn test_no_data_result() {
        let r = DiagnosticResult::no_data("AHU-3");
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert!(!r.create_work_order);
        assert!(r.work_order.is_none());
        assert!(r.recommendation.contains("baseline"));
    }
}
