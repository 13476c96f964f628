//! Model Reply Parsing
//!
//! Coerces free-form model output into the fixed diagnosis schema. Replies
//! are cleaned (reasoning blocks, code fences), parsed directly, and if that
//! fails the outermost `{ … }` object embedded in prose is recovered. The
//! result is validated field by field; anything that does not conform is a
//! `ModelBackendError`, never a partially-filled analysis.

use serde::{Deserialize, Serialize};

use super::ModelBackendError;
use crate::config::defaults::DEFAULT_AI_ASSIGNED_TEAM;
use crate::types::{RiskLevel, WorkOrder, WorkOrderPriority};

// ============================================================================
// Validated analysis
// ============================================================================

/// Failure-probability envelope over three horizons.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureProbability {
    #[serde(rename = "<7d")]
    pub within_7d: f64,
    #[serde(rename = "8-30d")]
    pub within_30d: f64,
    #[serde(rename = "31-90d")]
    pub within_90d: f64,
}

impl FailureProbability {
    /// Elementwise maximum.
    pub fn max(self, other: FailureProbability) -> FailureProbability {
        FailureProbability {
            within_7d: self.within_7d.max(other.within_7d),
            within_30d: self.within_30d.max(other.within_30d),
            within_90d: self.within_90d.max(other.within_90d),
        }
    }

    fn values(&self) -> [(&'static str, f64); 3] {
        [("<7d", self.within_7d), ("8-30d", self.within_30d), ("31-90d", self.within_90d)]
    }
}

/// One backend's diagnosis after schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnalysis {
    pub risk_level: RiskLevel,
    pub finding: String,
    pub recommendation: String,
    pub create_work_order: bool,
    pub confidence_score: f64,
    pub failure_probability: FailureProbability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_order: Option<WorkOrder>,
}

// ============================================================================
// Raw reply schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawModelResponse {
    risk_level: String,
    finding: String,
    recommendation: String,
    create_work_order: bool,
    confidence_score: f64,
    failure_probability: FailureProbability,
    #[serde(default)]
    work_order: Option<RawWorkOrder>,
}

#[derive(Debug, Deserialize)]
struct RawWorkOrder {
    title: String,
    #[serde(default)]
    description: String,
    priority: String,
    due_hours: u32,
    #[serde(default)]
    assigned_team: Option<String>,
}

fn parse_priority(s: &str) -> Result<WorkOrderPriority, ModelBackendError> {
    match s.trim().to_lowercase().as_str() {
        "low" => Ok(WorkOrderPriority::Low),
        "medium" => Ok(WorkOrderPriority::Medium),
        "high" => Ok(WorkOrderPriority::High),
        "urgent" | "critical" => Ok(WorkOrderPriority::Urgent),
        other => Err(ModelBackendError::Schema(format!("unknown work order priority '{other}'"))),
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ModelBackendError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelBackendError::Schema(format!("{field} = {value} is outside [0, 1]")))
    }
}

impl RawModelResponse {
    fn validate(self) -> Result<ModelAnalysis, ModelBackendError> {
        let risk_level: RiskLevel = self.risk_level.parse().map_err(ModelBackendError::Schema)?;

        if self.finding.trim().is_empty() {
            return Err(ModelBackendError::Schema("finding is empty".to_string()));
        }
        check_unit_interval("confidence_score", self.confidence_score)?;
        for (window, p) in self.failure_probability.values() {
            check_unit_interval(&format!("failure_probability[{window}]"), p)?;
        }

        let work_order = self
            .work_order
            .map(|wo| -> Result<WorkOrder, ModelBackendError> {
                Ok(WorkOrder {
                    priority: parse_priority(&wo.priority)?,
                    description: if wo.description.is_empty() { self.finding.clone() } else { wo.description },
                    title: wo.title,
                    due_hours: wo.due_hours,
                    assigned_team: wo
                        .assigned_team
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_AI_ASSIGNED_TEAM.to_string()),
                })
            })
            .transpose()?;

        Ok(ModelAnalysis {
            risk_level,
            finding: self.finding,
            recommendation: self.recommendation,
            create_work_order: self.create_work_order,
            confidence_score: self.confidence_score,
            failure_probability: self.failure_probability,
            work_order,
        })
    }
}

// ============================================================================
// Text cleanup
// ============================================================================

/// Drop `<think>…</think>` reasoning blocks some models emit before the
/// answer. An unclosed block keeps whatever follows its first `{`.
pub fn strip_think_tags(text: &str) -> String {
    // ASCII lowering keeps byte offsets valid for slicing `text`
    let lower = text.to_ascii_lowercase();

    if let Some(end_pos) = lower.rfind("</think>") {
        return text[end_pos + "</think>".len()..].trim().to_string();
    }

    if let Some(start) = lower.find("<think>") {
        let before = text[..start].trim();
        if before.contains('{') {
            return before.to_string();
        }
        let after = &text[start + "<think>".len()..];
        return match after.find('{') {
            Some(brace) => after[brace..].trim().to_string(),
            None => after.trim().to_string(),
        };
    }

    text.trim().to_string()
}

/// Remove a surrounding Markdown code fence (```json … ```).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") up to the first newline
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse and validate one raw model reply.
pub fn parse_model_reply(raw: &str) -> Result<ModelAnalysis, ModelBackendError> {
    let cleaned = strip_think_tags(raw);
    let text = strip_code_fence(&cleaned);
    if text.is_empty() {
        return Err(ModelBackendError::EmptyReply);
    }

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(direct_err) => {
            let embedded = extract_json_object(text)
                .ok_or_else(|| ModelBackendError::MalformedJson(direct_err.to_string()))?;
            serde_json::from_str(embedded).map_err(|e| ModelBackendError::MalformedJson(e.to_string()))?
        }
    };
    if !value.is_object() {
        return Err(ModelBackendError::MalformedJson("top-level value is not an object".to_string()));
    }

    let raw: RawModelResponse =
        serde_json::from_value(value).map_err(|e| ModelBackendError::Schema(e.to_string()))?;
    raw.validate()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "risk_level": "high",
        "finding": "Compressor bearing wear indicated by rising vibration",
        "recommendation": "Schedule vibration analysis and bearing inspection",
        "create_work_order": true,
        "confidence_score": 0.82,
        "failure_probability": {"<7d": 0.05, "8-30d": 0.2, "31-90d": 0.45},
        "work_order": {"title": "Inspect compressor bearings", "priority": "high", "due_hours": 24},
        "likely_failure_modes": ["compressor_bearing_wear"]
    }"#;

    #[test]
    fn test_parses_valid_reply() {
        let a = parse_model_reply(VALID).unwrap();
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(a.create_work_order);
        assert_eq!(a.failure_probability.within_90d, 0.45);
        let wo = a.work_order.unwrap();
        assert_eq!(wo.priority, WorkOrderPriority::High);
        assert_eq!(wo.assigned_team, DEFAULT_AI_ASSIGNED_TEAM);
        // Empty description inherits the finding
        assert!(wo.description.contains("bearing wear"));
    }

    #[test]
    fn test_recovers_json_embedded_in_prose() {
        let raw = format!("Here is my assessment:\n{VALID}\nLet me know if you need more.");
        assert!(parse_model_reply(&raw).is_ok());
    }

    #[test]
    fn test_strips_fence_and_think_block() {
        let raw = format!("<think>vibration is trending up…</think>\n```json\n{VALID}\n```");
        assert_eq!(parse_model_reply(&raw).unwrap().risk_level, RiskLevel::High);
    }

    #[test]
    fn test_unclosed_think_block() {
        let raw = format!("<think>still reasoning {VALID}");
        assert!(parse_model_reply(&raw).is_ok());
    }

    #[test]
    fn test_prose_only_is_malformed() {
        let err = parse_model_reply("The chiller looks fine to me.").unwrap_err();
        assert!(matches!(err, ModelBackendError::MalformedJson(_)));
    }

    #[test]
    fn test_empty_reply() {
        assert!(matches!(parse_model_reply("  \n"), Err(ModelBackendError::EmptyReply)));
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let err = parse_model_reply(r#"{"risk_level": "low", "finding": "ok"}"#).unwrap_err();
        assert!(matches!(err, ModelBackendError::Schema(_)));
    }

    #[test]
    fn test_unknown_risk_is_schema_error() {
        // First "high" is the risk level
        let raw = VALID.replacen("\"high\"", "\"elevated\"", 1);
        let err = parse_model_reply(&raw).unwrap_err();
        assert!(matches!(err, ModelBackendError::Schema(_)), "{err}");
    }

    #[test]
    fn test_confidence_out_of_range_is_schema_error() {
        let raw = VALID.replace("0.82", "82");
        assert!(matches!(parse_model_reply(&raw), Err(ModelBackendError::Schema(_))));
    }

    #[test]
    fn test_probability_out_of_range_is_schema_error() {
        let raw = VALID.replace("\"31-90d\": 0.45", "\"31-90d\": 1.5");
        assert!(matches!(parse_model_reply(&raw), Err(ModelBackendError::Schema(_))));
    }

    #[test]
    fn test_array_is_malformed() {
        assert!(matches!(parse_model_reply("[1, 2]"), Err(ModelBackendError::MalformedJson(_))));
    }

    #[test]
    fn test_failure_probability_max() {
        let a = FailureProbability { within_7d: 0.1, within_30d: 0.5, within_90d: 0.2 };
        let b = FailureProbability { within_7d: 0.3, within_30d: 0.2, within_90d: 0.2 };
        let m = a.max(b);
        assert_eq!(m, FailureProbability { within_7d: 0.3, within_30d: 0.5, within_90d: 0.2 });
    }
}
