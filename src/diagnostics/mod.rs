//! Diagnostic Service
//!
//! Entry point of the engine: `diagnose(equipment_id, source_preference)`.
//!
//! ## Pipeline
//!
//! 1. Load equipment, windowed readings and maintenance checks from the store
//! 2. Derive check readings and merge with live readings per preference
//! 3. Empty merge: persist and return the no-data result
//! 4. Baselines, anomalies, failure profile, Weibull estimate, data quality
//! 5. Local mode runs the tiered policy engine; AI mode runs the
//!    orchestrator and falls back to the policy engine when no model answers
//! 6. Persist exactly one `DiagnosticSession`

mod session;

pub use session::{AnalysisMode, DiagnosticSession, ModelOutcomeRecord};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::baseline::BaselineEngine;
use crate::config::DiagnosticsConfig;
use crate::llm::{DiagnosticPayload, ModelKind};
use crate::orchestrator::{DiagnosticOrchestrator, DiagnosticUnavailable};
use crate::policy::{MaintenanceFrequencySnapshot, PolicyInput, TieredPolicyEngine};
use crate::profiles::{match_profile, weibull_failure_probability};
use crate::quality::{DataQualityAssessment, DataQualityScorer, DataSource};
use crate::readings::{derive_readings, merge, split_latest};
use crate::storage::{DiagnosticStore, StorageError};
use crate::types::{
    DiagnosticResult, EquipmentInfo, MaintenanceCheck, Reading, ReadingSource, ReadingSourcePreference, ReportKind,
};

/// Prefix marking a result that the policy engine produced in place of the models.
pub const FALLBACK_PREFIX: &str = "[AI unavailable, local policy] ";

/// Most recent checks forwarded to the AI prompt.
const PROMPT_CHECKS: usize = 10;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Unavailable(#[from] DiagnosticUnavailable),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    pub equipment_id: String,
    #[serde(default)]
    pub source_preference: ReadingSourcePreference,
    #[serde(default)]
    pub mode: AnalysisMode,
    /// Empty means every configured backend
    #[serde(default)]
    pub models: BTreeSet<ModelKind>,
}

impl DiagnoseRequest {
    pub fn local(equipment_id: impl Into<String>) -> Self {
        Self { equipment_id: equipment_id.into(), ..Self::default() }
    }
}

/// Everything loaded from the store for one equipment id.
struct EquipmentData {
    equipment: EquipmentInfo,
    live: Vec<Reading>,
    /// Newest first
    checks: Vec<MaintenanceCheck>,
    /// Start of the analysis window shared by live and check-derived readings
    window_start: DateTime<Utc>,
    counts: BTreeMap<DataSource, u32>,
}

#[derive(Clone)]
pub struct DiagnosticService {
    store: Arc<dyn DiagnosticStore>,
    config: Arc<DiagnosticsConfig>,
    orchestrator: Option<Arc<DiagnosticOrchestrator>>,
    baseline: BaselineEngine,
    policy: TieredPolicyEngine,
    quality: DataQualityScorer,
}

impl DiagnosticService {
    pub fn new(store: Arc<dyn DiagnosticStore>, config: Arc<DiagnosticsConfig>) -> Self {
        Self {
            baseline: BaselineEngine::new(config.baseline.clone()),
            policy: TieredPolicyEngine::from_config(&config),
            quality: DataQualityScorer::new(config.quality.clone()),
            store,
            config,
            orchestrator: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: DiagnosticOrchestrator) -> Self {
        self.orchestrator = Some(Arc::new(orchestrator));
        self
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn available_models(&self) -> Vec<ModelKind> {
        self.orchestrator.as_ref().map(|o| o.available()).unwrap_or_default()
    }

    pub async fn diagnose(&self, request: DiagnoseRequest) -> Result<DiagnosticSession, DiagnosticError> {
        self.diagnose_at(request, Utc::now()).await
    }

    /// Run a diagnosis as of `now`.
    pub async fn diagnose_at(
        &self,
        request: DiagnoseRequest,
        now: DateTime<Utc>,
    ) -> Result<DiagnosticSession, DiagnosticError> {
        let equipment_id = request.equipment_id.as_str();
        let data = self.load(equipment_id, now)?;
        let data_quality = self.quality.assess(&data.counts);

        let windowed_checks: Vec<MaintenanceCheck> = data
            .checks
            .iter()
            .filter(|c| c.performed_at >= data.window_start)
            .cloned()
            .collect();
        let derived = derive_readings(&windowed_checks);
        let merged = merge(&data.live, &derived, request.source_preference);

        let profile = match_profile(&data.equipment.match_text(), &data.equipment.equipment_type);

        let mut session = DiagnosticSession {
            id: Uuid::new_v4(),
            equipment_id: equipment_id.to_string(),
            created_at: now,
            source_preference: request.source_preference,
            mode: request.mode,
            result: DiagnosticResult::no_data(equipment_id),
            fell_back_to_local: false,
            model_outcomes: BTreeMap::new(),
            consensus: None,
            policy_action: None,
            data_quality,
            anomalies: Vec::new(),
            weibull: None,
            profile_label: profile.label.clone(),
            readings_analyzed: merged.len(),
        };

        if merged.is_empty() {
            info!(equipment_id, preference = %request.source_preference, "No readings available, recording no-data session");
            self.store.save_session(&session)?;
            return Ok(session);
        }

        let (history, current) = split_latest(&merged);
        let baselines = self.baseline.compute_baselines_at(&history, now);
        let anomalies = self.baseline.detect_anomalies(&current, &baselines);

        let age_years = data.equipment.age_years(now);
        let condition = data.equipment.condition_pct.unwrap_or(self.config.analysis.default_condition_pct);
        let weibull = age_years.map(|age| weibull_failure_probability(age, &profile.profile, condition));

        session.anomalies = anomalies;
        session.weibull = weibull;

        match request.mode {
            AnalysisMode::Local => self.apply_policy(&mut session, &merged, &data.checks, now),
            AnalysisMode::Ai => {
                let payload = DiagnosticPayload {
                    equipment: data.equipment.clone(),
                    age_years,
                    profile_label: profile.label,
                    failure_profile: profile.profile,
                    weibull,
                    baselines: baselines.into_values().collect(),
                    anomalies: session.anomalies.clone(),
                    readings: tail(&merged, self.config.analysis.max_prompt_readings),
                    thresholds: self.config.templates.clone(),
                    maintenance: MaintenanceFrequencySnapshot::from_checks(&data.checks, now, &self.config.policy),
                    recent_checks: data.checks.iter().take(PROMPT_CHECKS).cloned().collect(),
                    data_quality: session.data_quality.clone(),
                };
                self.apply_models(&mut session, &payload, &request.models, &merged, &data.checks, now)
                    .await?;
            }
        }

        self.store.save_session(&session)?;
        info!(
            equipment_id,
            session_id = %session.id,
            mode = %session.mode,
            risk = %session.result.risk_level,
            fallback = session.fell_back_to_local,
            "Diagnostic session persisted"
        );
        Ok(session)
    }

    /// Data-quality assessment without running a diagnosis.
    pub fn data_quality(&self, equipment_id: &str) -> Result<DataQualityAssessment, DiagnosticError> {
        let data = self.load(equipment_id, Utc::now())?;
        Ok(self.quality.assess(&data.counts))
    }

    pub fn sessions(&self, equipment_id: &str, limit: usize) -> Result<Vec<DiagnosticSession>, DiagnosticError> {
        Ok(self.store.sessions(equipment_id, limit)?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn load(&self, equipment_id: &str, now: DateTime<Utc>) -> Result<EquipmentData, StorageError> {
        let equipment = match self.store.equipment(equipment_id)? {
            Some(e) => e,
            None => {
                warn!(equipment_id, "Equipment not registered, using placeholder record");
                EquipmentInfo::unknown(equipment_id)
            }
        };

        let since = now - Duration::days(self.config.analysis.history_days);
        let live: Vec<Reading> = self
            .store
            .readings(equipment_id, since)?
            .into_iter()
            .filter(|r| r.timestamp <= now)
            .collect();
        let checks: Vec<MaintenanceCheck> = self
            .store
            .maintenance_checks(equipment_id)?
            .into_iter()
            .filter(|c| c.performed_at <= now)
            .collect();
        let reports = self.store.supplemental_reports(equipment_id)?;

        let log_since = now - Duration::days(self.config.analysis.manual_log_window_days);
        let mut counts = BTreeMap::new();
        counts.insert(
            DataSource::SensorReadings,
            saturating_count(live.iter().filter(|r| r.source == ReadingSource::LiveSensor)),
        );
        counts.insert(
            DataSource::ManualMaintenanceLogs,
            saturating_count(checks.iter().filter(|c| c.performed_at >= log_since)),
        );
        counts.insert(DataSource::MaintenanceHistory, saturating_count(checks.iter()));
        for (source, kind) in [
            (DataSource::RefrigerantReports, ReportKind::Refrigerant),
            (DataSource::VibrationAnalysis, ReportKind::Vibration),
            (DataSource::CondenserMaintenance, ReportKind::Condenser),
        ] {
            counts.insert(source, saturating_count(reports.iter().filter(|r| r.kind == kind)));
        }

        Ok(EquipmentData { equipment, live, checks, window_start: since, counts })
    }

    fn apply_policy(
        &self,
        session: &mut DiagnosticSession,
        merged: &[Reading],
        checks: &[MaintenanceCheck],
        now: DateTime<Utc>,
    ) {
        let decision = self.policy.evaluate(PolicyInput {
            equipment_id: &session.equipment_id,
            readings: merged,
            anomalies: &session.anomalies,
            checks,
            now,
        });
        session.policy_action = Some(decision.action);
        session.result = decision.result;
    }

    async fn apply_models(
        &self,
        session: &mut DiagnosticSession,
        payload: &DiagnosticPayload,
        models: &BTreeSet<ModelKind>,
        merged: &[Reading],
        checks: &[MaintenanceCheck],
        now: DateTime<Utc>,
    ) -> Result<(), DiagnosticError> {
        let outcome = match &self.orchestrator {
            Some(orchestrator) => orchestrator.diagnose(payload, models).await,
            None => Err(DiagnosticUnavailable { failures: Vec::new() }),
        };

        match outcome {
            Ok(outcome) => {
                session.model_outcomes = outcome
                    .per_model
                    .into_iter()
                    .map(|(kind, o)| {
                        let record = match o {
                            Ok(analysis) => ModelOutcomeRecord::Ok { analysis },
                            Err(e) => ModelOutcomeRecord::Error { message: e.to_string() },
                        };
                        (kind, record)
                    })
                    .collect();
                session.consensus = outcome.consensus;
                session.result = outcome.result;
                Ok(())
            }
            Err(unavailable) => {
                if !self.config.ai.fallback_to_local {
                    warn!(equipment_id = %session.equipment_id, error = %unavailable, "AI diagnosis unavailable, fallback disabled");
                    return Err(unavailable.into());
                }
                warn!(equipment_id = %session.equipment_id, error = %unavailable, "AI diagnosis unavailable, falling back to local policy");

                session.model_outcomes = unavailable
                    .failures
                    .iter()
                    .map(|(kind, e)| (*kind, ModelOutcomeRecord::Error { message: e.to_string() }))
                    .collect();
                self.apply_policy(session, merged, checks, now);
                session.result.finding = format!("{FALLBACK_PREFIX}{}", session.result.finding);
                session.fell_back_to_local = true;
                Ok(())
            }
        }
    }
}

fn saturating_count<I: Iterator>(iter: I) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

/// Last `n` items, order preserved.
fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SledStore;
    use crate::types::{Cadence, RiskLevel};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    fn service() -> (SledStore, DiagnosticService) {
        let store = SledStore::temporary().unwrap();
        let svc = DiagnosticService::new(Arc::new(store.clone()), Arc::new(DiagnosticsConfig::default()));
        (store, svc)
    }

    fn check(id: &str, cadence: Cadence, days_ago: i64, measurements: &[(&str, f64)]) -> MaintenanceCheck {
        MaintenanceCheck {
            id: id.to_string(),
            equipment_id: "RTU-1".to_string(),
            cadence,
            performed_at: now() - Duration::days(days_ago),
            technician: None,
            measurements: measurements.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_no_readings_persists_no_data_session() {
        let (store, svc) = service();
        let session = svc.diagnose_at(DiagnoseRequest::local("RTU-1"), now()).await.unwrap();
        assert_eq!(session.result.risk_level, RiskLevel::Low);
        assert!(!session.result.create_work_order);
        assert!(session.result.recommendation.contains("baseline"));
        assert_eq!(session.readings_analyzed, 0);
        assert_eq!(store.sessions("RTU-1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_derived_critical_vibration() {
        let (store, svc) = service();
        for d in 0..5 {
            store
                .insert_check(&check(&format!("d{d}"), Cadence::Daily, d + 1, &[("vibration_ips", 0.1)]))
                .unwrap();
        }
        store.insert_check(&check("w0", Cadence::Weekly, 2, &[])).unwrap();
        store.insert_check(&check("w1", Cadence::Weekly, 9, &[])).unwrap();
        store.insert_check(&check("m0", Cadence::Monthly, 10, &[])).unwrap();
        // Newest daily check reports a severe vibration
        store
            .insert_check(&MaintenanceCheck {
                performed_at: now() - Duration::hours(1),
                ..check("d-now", Cadence::Daily, 0, &[("vibration_ips", 1.2)])
            })
            .unwrap();

        let session = svc.diagnose_at(DiagnoseRequest::local("RTU-1"), now()).await.unwrap();
        assert_eq!(session.result.risk_level, RiskLevel::Critical);
        assert!(session.result.create_work_order);
        assert_eq!(session.policy_action, Some(crate::policy::MaintenanceAction::ImmediateDetailedInspection));
    }

    #[tokio::test]
    async fn test_checks_outside_history_window_are_not_derived() {
        let (store, svc) = service();
        let history_days = svc.config().analysis.history_days;
        store
            .insert_check(&check("ancient", Cadence::Daily, history_days + 30, &[("vibration_ips", 0.1)]))
            .unwrap();

        let session = svc.diagnose_at(DiagnoseRequest::local("RTU-1"), now()).await.unwrap();
        assert_eq!(session.readings_analyzed, 0);
        // Still counted as maintenance history
        assert_eq!(session.data_quality.per_source["maintenance_history"].count, 1);

        store
            .insert_check(&check("recent", Cadence::Daily, 3, &[("vibration_ips", 0.1)]))
            .unwrap();
        let session = svc.diagnose_at(DiagnoseRequest::local("RTU-1"), now()).await.unwrap();
        assert_eq!(session.readings_analyzed, 1);
    }

    #[tokio::test]
    async fn test_ai_mode_without_backends_falls_back() {
        let (store, svc) = service();
        store
            .insert_reading(&Reading::new("RTU-1", "vibration", 0.1, "in/s", now() - Duration::hours(2), ReadingSource::LiveSensor))
            .unwrap();
        let request = DiagnoseRequest { mode: AnalysisMode::Ai, ..DiagnoseRequest::local("RTU-1") };
        let session = svc.diagnose_at(request, now()).await.unwrap();
        assert!(session.fell_back_to_local);
        assert!(session.result.finding.starts_with(FALLBACK_PREFIX));
        assert!(session.policy_action.is_some());
    }

    #[tokio::test]
    async fn test_ai_mode_without_fallback_is_unavailable() {
        let store = SledStore::temporary().unwrap();
        store
            .insert_reading(&Reading::new("RTU-1", "vibration", 0.1, "in/s", now() - Duration::hours(2), ReadingSource::LiveSensor))
            .unwrap();
        let mut config = DiagnosticsConfig::default();
        config.ai.fallback_to_local = false;
        let svc = DiagnosticService::new(Arc::new(store.clone()), Arc::new(config));

        let request = DiagnoseRequest { mode: AnalysisMode::Ai, ..DiagnoseRequest::local("RTU-1") };
        let err = svc.diagnose_at(request, now()).await.unwrap_err();
        assert!(matches!(err, DiagnosticError::Unavailable(_)));
        assert!(store.sessions("RTU-1", 10).unwrap().is_empty());
    }

    #[test]
    fn test_data_quality_counts_sources() {
        let (store, svc) = service();
        let t = Utc::now();
        for h in 0..12 {
            store
                .insert_reading(&Reading::new("RTU-1", "motor_current", 20.0, "A", t - Duration::hours(h + 1), ReadingSource::LiveSensor))
                .unwrap();
        }
        let dq = svc.data_quality("RTU-1").unwrap();
        assert_eq!(dq.per_source["sensor_readings"].count, 12);
        assert_eq!(dq.per_source["maintenance_history"].count, 0);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail(&[1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(tail(&[1, 2], 5), vec![1, 2]);
    }
}
