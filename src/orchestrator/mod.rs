//! Multi-Model Diagnostic Orchestrator
//!
//! Sends the same payload to every requested backend concurrently, each in
//! its own task with its own timeout, then reconciles the successful replies.
//!
//! - One backend failing (transport, timeout, malformed reply, panic) is
//!   recorded against that model and never blocks the others
//! - Two or more successes produce a `ConsensusAnalysis`
//! - Exactly one success stands as the result, without consensus
//! - Zero successes is `DiagnosticUnavailable`; callers fall back to the
//!   local policy engine

pub mod consensus;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::AiConfig;
use crate::llm::{
    build_prompt, parse_model_reply, BackendSet, DiagnosticPayload, ModelAnalysis, ModelBackendError, ModelKind,
};
use crate::types::DiagnosticResult;

pub use consensus::{compose_result, compute_consensus, ConsensusAnalysis, ModelAgreement};

pub type ModelOutcome = Result<ModelAnalysis, ModelBackendError>;

/// Every requested backend failed.
#[derive(Debug, Error)]
#[error("no AI backend produced a diagnosis ({})", summarize(.failures))]
pub struct DiagnosticUnavailable {
    pub failures: Vec<(ModelKind, ModelBackendError)>,
}

fn summarize(failures: &[(ModelKind, ModelBackendError)]) -> String {
    if failures.is_empty() {
        return "no backends requested".to_string();
    }
    failures
        .iter()
        .map(|(kind, e)| format!("{kind}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of a successful orchestration (at least one model succeeded).
#[derive(Debug)]
pub struct OrchestratorOutcome {
    pub per_model: BTreeMap<ModelKind, ModelOutcome>,
    pub consensus: Option<ConsensusAnalysis>,
    pub result: DiagnosticResult,
}

pub struct DiagnosticOrchestrator {
    backends: BackendSet,
    timeout: Duration,
    agreement_boost: f64,
}

impl DiagnosticOrchestrator {
    pub fn new(backends: BackendSet, ai: &AiConfig) -> Self {
        Self {
            backends,
            timeout: Duration::from_secs(ai.timeout_secs),
            agreement_boost: ai.consensus_agreement_boost,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Models that can actually be called.
    pub fn available(&self) -> Vec<ModelKind> {
        self.backends.keys().copied().collect()
    }

    /// Run the requested models. An empty request means every configured backend.
    pub async fn diagnose(
        &self,
        payload: &DiagnosticPayload,
        requested: &BTreeSet<ModelKind>,
    ) -> Result<OrchestratorOutcome, DiagnosticUnavailable> {
        let requested: BTreeSet<ModelKind> = if requested.is_empty() {
            self.backends.keys().copied().collect()
        } else {
            requested.clone()
        };
        let equipment_id = payload.equipment.id.as_str();
        let prompt = Arc::new(build_prompt(payload));

        let mut per_model: BTreeMap<ModelKind, ModelOutcome> = BTreeMap::new();
        let mut handles = Vec::new();

        for kind in requested {
            let Some(backend) = self.backends.get(&kind) else {
                per_model.insert(kind, Err(ModelBackendError::NotConfigured(kind)));
                continue;
            };
            let backend = Arc::clone(backend);
            let prompt = Arc::clone(&prompt);
            let timeout = self.timeout;

            handles.push((
                kind,
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, backend.generate(&prompt)).await {
                        Ok(Ok(text)) => parse_model_reply(&text),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(ModelBackendError::Timeout(timeout)),
                    }
                }),
            ));
        }

        // All tasks are already running; awaiting in turn only collects them
        for (kind, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(ModelBackendError::TaskFailed(join_err.to_string())),
            };
            per_model.insert(kind, outcome);
        }

        for (kind, outcome) in &per_model {
            match outcome {
                Ok(a) => info!(equipment_id, model = %kind, risk = %a.risk_level, confidence = a.confidence_score, "Model analysis succeeded"),
                Err(e) => warn!(equipment_id, model = %kind, error = %e, "Model analysis failed"),
            }
        }

        let successes: Vec<(ModelKind, &ModelAnalysis)> = per_model
            .iter()
            .filter_map(|(kind, outcome)| outcome.as_ref().ok().map(|a| (*kind, a)))
            .collect();

        let consensus = compute_consensus(&successes, self.agreement_boost);
        let Some(result) = compose_result(equipment_id, &successes, consensus.as_ref()) else {
            let failures = per_model
                .into_iter()
                .filter_map(|(kind, outcome)| outcome.err().map(|e| (kind, e)))
                .collect();
            return Err(DiagnosticUnavailable { failures });
        };

        if let Some(c) = &consensus {
            info!(
                equipment_id,
                risk = %c.risk_level,
                confidence = c.confidence_score,
                agreement = c.model_agreement.risk_agreement,
                "Consensus reached"
            );
        }

        Ok(OrchestratorOutcome { per_model, consensus, result })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelBackend, ModelPrompt};
    use crate::policy::MaintenanceFrequencySnapshot;
    use crate::profiles::match_profile;
    use crate::quality::DataQualityScorer;
    use crate::types::{EquipmentInfo, RiskLevel};
    use async_trait::async_trait;

    enum Behavior {
        Reply(String),
        Fail,
        Hang,
        Panic,
    }

    struct FakeBackend {
        kind: ModelKind,
        behavior: Behavior,
    }

    #[async_trait]
    impl ModelBackend for FakeBackend {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        async fn generate(&self, _prompt: &ModelPrompt) -> Result<String, ModelBackendError> {
            match &self.behavior {
                Behavior::Reply(text) => Ok(text.clone()),
                Behavior::Fail => Err(ModelBackendError::Status { status: 500, body: "boom".to_string() }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }
                Behavior::Panic => panic!("backend exploded"),
            }
        }
    }

    fn reply(risk: &str, confidence: f64) -> Behavior {
        Behavior::Reply(format!(
            r#"{{"risk_level":"{risk}","finding":"{risk} risk","recommendation":"act","create_work_order":false,
               "confidence_score":{confidence},"failure_probability":{{"<7d":0.1,"8-30d":0.2,"31-90d":0.3}}}}"#
        ))
    }

    fn orchestrator(backends: Vec<(ModelKind, Behavior)>) -> DiagnosticOrchestrator {
        let set: BackendSet = backends
            .into_iter()
            .map(|(kind, behavior)| (kind, Arc::new(FakeBackend { kind, behavior }) as Arc<dyn ModelBackend>))
            .collect();
        DiagnosticOrchestrator::new(set, &AiConfig::default()).with_timeout(Duration::from_millis(200))
    }

    fn payload() -> DiagnosticPayload {
        let equipment = EquipmentInfo::unknown("CH-9");
        let m = match_profile(&equipment.match_text(), &equipment.equipment_type);
        DiagnosticPayload {
            equipment,
            age_years: Some(8.0),
            profile_label: m.label,
            failure_profile: m.profile,
            weibull: None,
            baselines: Vec::new(),
            anomalies: Vec::new(),
            readings: Vec::new(),
            thresholds: Vec::new(),
            maintenance: MaintenanceFrequencySnapshot::from_checks(
                &[],
                chrono::Utc::now(),
                &crate::config::PolicyConfig::default(),
            ),
            recent_checks: Vec::new(),
            data_quality: DataQualityScorer::default().assess(&BTreeMap::new()),
        }
    }

    fn both() -> BTreeSet<ModelKind> {
        ModelKind::ALL.into_iter().collect()
    }

    #[tokio::test]
    async fn test_two_models_reach_consensus() {
        let o = orchestrator(vec![
            (ModelKind::OpenAi, reply("low", 0.6)),
            (ModelKind::Anthropic, reply("high", 0.8)),
        ]);
        let out = o.diagnose(&payload(), &both()).await.unwrap();
        let c = out.consensus.unwrap();
        assert_eq!(c.risk_level, RiskLevel::Medium);
        assert!((c.confidence_score - 0.7).abs() < 1e-12);
        assert!(!c.model_agreement.risk_agreement);
        assert_eq!(out.result.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_one_failure_keeps_single_result() {
        let o = orchestrator(vec![
            (ModelKind::OpenAi, Behavior::Fail),
            (ModelKind::Anthropic, reply("medium", 0.75)),
        ]);
        let out = o.diagnose(&payload(), &both()).await.unwrap();
        assert!(out.consensus.is_none());
        assert!(out.per_model[&ModelKind::OpenAi].is_err());
        assert_eq!(out.result.risk_level, RiskLevel::Medium);
        assert_eq!(out.result.confidence_score, 0.75);
    }

    #[tokio::test]
    async fn test_panicking_backend_is_isolated() {
        let o = orchestrator(vec![
            (ModelKind::OpenAi, Behavior::Panic),
            (ModelKind::Anthropic, reply("low", 0.9)),
        ]);
        let out = o.diagnose(&payload(), &both()).await.unwrap();
        assert!(matches!(out.per_model[&ModelKind::OpenAi], Err(ModelBackendError::TaskFailed(_))));
        assert_eq!(out.result.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_alone() {
        let o = orchestrator(vec![
            (ModelKind::OpenAi, Behavior::Hang),
            (ModelKind::Anthropic, reply("high", 0.7)),
        ]);
        let started = std::time::Instant::now();
        let out = o.diagnose(&payload(), &both()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(out.per_model[&ModelKind::OpenAi], Err(ModelBackendError::Timeout(_))));
        assert_eq!(out.result.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_all_failing_is_unavailable() {
        let o = orchestrator(vec![
            (ModelKind::OpenAi, Behavior::Fail),
            (ModelKind::Anthropic, Behavior::Reply("not json at all".to_string())),
        ]);
        let err = o.diagnose(&payload(), &both()).await.unwrap_err();
        assert_eq!(err.failures.len(), 2);
        assert!(err.to_string().contains("openai"));
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_reported() {
        let o = orchestrator(vec![(ModelKind::Anthropic, reply("low", 0.6))]);
        let out = o.diagnose(&payload(), &both()).await.unwrap();
        assert!(matches!(
            out.per_model[&ModelKind::OpenAi],
            Err(ModelBackendError::NotConfigured(ModelKind::OpenAi))
        ));
        assert!(out.consensus.is_none());
    }

    #[tokio::test]
    async fn test_no_backends_is_unavailable() {
        let o = orchestrator(Vec::new());
        let err = o.diagnose(&payload(), &BTreeSet::new()).await.unwrap_err();
        assert!(err.failures.is_empty());
    }
}
