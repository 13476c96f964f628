//! Cross-model consensus
//!
//! Reconciles two or more validated model analyses:
//! - risk: bucketed mean of ordinal risk (low=1 … critical=4)
//! - confidence: arithmetic mean, optionally boosted when every model agrees
//! - failure probability: elementwise max (never under-warns)
//! - agreement: raw risk equality and confidence spread

use serde::{Deserialize, Serialize};

use crate::config::defaults::{DEFAULT_AI_ASSIGNED_TEAM, MAX_REPORTED_CONFIDENCE};
use crate::llm::{FailureProbability, ModelAnalysis, ModelKind};
use crate::types::{DiagnosticResult, RiskLevel, WorkOrder, WorkOrderPriority};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelAgreement {
    pub risk_agreement: bool,
    /// |a − b| for two models, max − min for more
    pub confidence_variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusAnalysis {
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub failure_probability: FailureProbability,
    pub model_agreement: ModelAgreement,
    pub contributing_models: Vec<ModelKind>,
}

/// Consensus over the successful analyses; `None` with fewer than two.
///
/// `agreement_boost` multiplies the mean confidence when all models report the
/// same risk level. The boosted value is capped; `1.0` disables the boost.
pub fn compute_consensus(
    analyses: &[(ModelKind, &ModelAnalysis)],
    agreement_boost: f64,
) -> Option<ConsensusAnalysis> {
    if analyses.len() < 2 {
        return None;
    }
    let n = analyses.len() as f64;

    let avg_ordinal = analyses.iter().map(|(_, a)| f64::from(a.risk_level.ordinal())).sum::<f64>() / n;
    let risk_level = RiskLevel::from_average(avg_ordinal);

    let confidences: Vec<f64> = analyses.iter().map(|(_, a)| a.confidence_score).collect();
    let mean_confidence = confidences.iter().sum::<f64>() / n;
    let max_conf = confidences.iter().copied().fold(f64::MIN, f64::max);
    let min_conf = confidences.iter().copied().fold(f64::MAX, f64::min);

    let first_risk = analyses[0].1.risk_level;
    let risk_agreement = analyses.iter().all(|(_, a)| a.risk_level == first_risk);

    let confidence_score = if risk_agreement && agreement_boost > 1.0 {
        (mean_confidence * agreement_boost).min(MAX_REPORTED_CONFIDENCE)
    } else {
        mean_confidence
    };

    let failure_probability = analyses
        .iter()
        .map(|(_, a)| a.failure_probability)
        .reduce(FailureProbability::max)
        .unwrap_or_default();

    Some(ConsensusAnalysis {
        risk_level,
        confidence_score,
        failure_probability,
        model_agreement: ModelAgreement {
            risk_agreement,
            confidence_variance: max_conf - min_conf,
        },
        contributing_models: analyses.iter().map(|(k, _)| *k).collect(),
    })
}

/// The analysis whose narrative leads the result: highest risk, then
/// highest confidence.
fn lead_analysis<'a>(analyses: &[(ModelKind, &'a ModelAnalysis)]) -> Option<&'a ModelAnalysis> {
    analyses
        .iter()
        .map(|(_, a)| *a)
        .max_by(|a, b| {
            a.risk_level
                .cmp(&b.risk_level)
                .then(a.confidence_score.total_cmp(&b.confidence_score))
        })
}

/// Work order for a result whose models asked for one without drafting it.
fn fallback_work_order(risk: RiskLevel, lead: &ModelAnalysis) -> WorkOrder {
    let (priority, due_hours) = match risk {
        RiskLevel::Critical => (WorkOrderPriority::Urgent, 4),
        RiskLevel::High => (WorkOrderPriority::High, 24),
        RiskLevel::Medium => (WorkOrderPriority::Medium, 48),
        RiskLevel::Low => (WorkOrderPriority::Low, 168),
    };
    WorkOrder {
        title: format!("Inspect equipment ({risk} risk)"),
        description: format!("{} {}", lead.finding, lead.recommendation),
        priority,
        due_hours,
        assigned_team: DEFAULT_AI_ASSIGNED_TEAM.to_string(),
    }
}

/// Terminal result from the successful analyses.
///
/// With consensus, risk and confidence come from it; the narrative and work
/// order come from the lead analysis. With a single analysis it stands as is.
/// `create_work_order` always comes with a work order.
pub fn compose_result(
    asset_id: &str,
    analyses: &[(ModelKind, &ModelAnalysis)],
    consensus: Option<&ConsensusAnalysis>,
) -> Option<DiagnosticResult> {
    let lead = lead_analysis(analyses)?;
    let create_work_order = analyses.iter().any(|(_, a)| a.create_work_order);

    let (risk_level, confidence_score) = match consensus {
        Some(c) => (c.risk_level, c.confidence_score),
        None => (lead.risk_level, lead.confidence_score),
    };

    let work_order = if create_work_order {
        let drafted = lead.work_order.clone().or_else(|| {
            let mut by_risk: Vec<&ModelAnalysis> = analyses.iter().map(|(_, a)| *a).collect();
            by_risk.sort_by(|a, b| b.risk_level.cmp(&a.risk_level));
            by_risk.into_iter().find_map(|a| a.work_order.clone())
        });
        Some(drafted.unwrap_or_else(|| fallback_work_order(risk_level, lead)))
    } else {
        None
    };

    Some(DiagnosticResult {
        asset_id: asset_id.to_string(),
        risk_level,
        finding: lead.finding.clone(),
        recommendation: lead.recommendation.clone(),
        confidence_score,
        create_work_order,
        work_order,
    })
}
