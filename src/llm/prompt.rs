//! Diagnostic prompt construction
//!
//! Every backend receives the same structured payload serialized as JSON,
//! under a fixed system prompt that pins the response schema.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::baseline::{AnomalyFinding, StatisticalBaseline};
use crate::config::SensorTemplate;
use crate::policy::MaintenanceFrequencySnapshot;
use crate::profiles::{EquipmentFailureProfile, WeibullEstimate};
use crate::quality::DataQualityAssessment;
use crate::types::{EquipmentInfo, MaintenanceCheck, Reading};

const SYSTEM_PROMPT: &str = r#"You are an HVAC reliability engineer performing predictive-maintenance diagnosis.
You receive one piece of equipment with its failure profile, Weibull reliability estimate, statistical baselines, detected anomalies, recent readings, static thresholds, maintenance-check history and data-quality assessment.

Respond with a single JSON object and nothing else, using exactly this schema:
{
  "risk_level": "low" | "medium" | "high" | "critical",
  "finding": string,
  "recommendation": string,
  "create_work_order": boolean,
  "confidence_score": number between 0 and 1,
  "failure_probability": {"<7d": number 0-1, "8-30d": number 0-1, "31-90d": number 0-1},
  "work_order": {"title": string, "description": string, "priority": "low" | "medium" | "high" | "urgent", "due_hours": integer, "assigned_team": string} or null
}

Base the risk on the evidence provided. Lower your confidence when data quality is poor or baselines are missing."#;

/// The structured evidence sent to every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticPayload {
    pub equipment: EquipmentInfo,
    pub age_years: Option<f64>,
    pub profile_label: String,
    pub failure_profile: EquipmentFailureProfile,
    pub weibull: Option<WeibullEstimate>,
    pub baselines: Vec<StatisticalBaseline>,
    pub anomalies: Vec<AnomalyFinding>,
    /// Most recent merged readings, oldest first
    pub readings: Vec<Reading>,
    pub thresholds: Vec<SensorTemplate>,
    pub maintenance: MaintenanceFrequencySnapshot,
    pub recent_checks: Vec<MaintenanceCheck>,
    pub data_quality: DataQualityAssessment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPrompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(payload: &DiagnosticPayload) -> ModelPrompt {
    let body = serde_json::to_string_pretty(payload).unwrap_or_else(|e| {
        warn!(equipment_id = %payload.equipment.id, error = %e, "Payload serialization failed");
        format!("{{\"equipment_id\": \"{}\"}}", payload.equipment.id)
    });

    ModelPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Diagnose equipment {} ({}).\n\nEvidence:\n{body}",
            payload.equipment.id, payload.equipment.equipment_type
        ),
    }
}
