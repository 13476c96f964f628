//! Persisted record of one diagnosis run

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baseline::AnomalyFinding;
use crate::llm::{ModelAnalysis, ModelKind};
use crate::orchestrator::ConsensusAnalysis;
use crate::policy::MaintenanceAction;
use crate::profiles::WeibullEstimate;
use crate::quality::DataQualityAssessment;
use crate::types::{DiagnosticResult, ReadingSourcePreference};

/// Which engine produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Tiered maintenance policy only
    #[default]
    Local,
    /// Multi-model orchestration, falling back to the policy engine
    Ai,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::Local => write!(f, "local"),
            AnalysisMode::Ai => write!(f, "ai"),
        }
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "policy" => Ok(AnalysisMode::Local),
            "ai" | "llm" => Ok(AnalysisMode::Ai),
            other => Err(format!("unknown analysis mode '{other}' (expected local or ai)")),
        }
    }
}

/// Per-model outcome as stored; errors are kept as their display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcomeRecord {
    Ok { analysis: ModelAnalysis },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSession {
    pub id: Uuid,
    pub equipment_id: String,
    pub created_at: DateTime<Utc>,
    pub source_preference: ReadingSourcePreference,
    /// Mode that was requested
    pub mode: AnalysisMode,
    pub result: DiagnosticResult,
    /// Set when `mode = ai` but the policy engine produced the result
    #[serde(default)]
    pub fell_back_to_local: bool,
    #[serde(default)]
    pub model_outcomes: BTreeMap<ModelKind, ModelOutcomeRecord>,
    #[serde(default)]
    pub consensus: Option<ConsensusAnalysis>,
    #[serde(default)]
    pub policy_action: Option<MaintenanceAction>,
    pub data_quality: DataQualityAssessment,
    #[serde(default)]
    pub anomalies: Vec<AnomalyFinding>,
    #[serde(default)]
    pub weibull: Option<WeibullEstimate>,
    pub profile_label: String,
    pub readings_analyzed: usize,
}
