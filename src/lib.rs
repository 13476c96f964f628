//! HVAC-PDM: Predictive-maintenance diagnostics for facilities HVAC equipment
//!
//! Given an equipment id, fuses live and check-derived readings, statistical
//! baselines, manufacturer failure profiles and maintenance history into a
//! risk-rated `DiagnosticResult`, optionally reconciled across several AI
//! model backends.
//!
//! ## Architecture
//!
//! - **Readings**: source-preference merge of live and check-derived readings
//! - **Baseline**: per-parameter mean/stddev with monthly seasonal factors, z-score anomalies
//! - **Profiles**: failure-profile registry and Weibull failure probability
//! - **Quality**: weighted data-quality confidence across six evidence sources
//! - **Policy**: tiered maintenance policy (local, deterministic)
//! - **Orchestrator**: concurrent multi-model diagnosis with consensus
//! - **Diagnostics**: the `diagnose` service tying the above to storage

pub mod api;
pub mod baseline;
pub mod config;
pub mod diagnostics;
pub mod llm;
pub mod orchestrator;
pub mod policy;
pub mod profiles;
pub mod quality;
pub mod readings;
pub mod storage;
pub mod types;

pub use config::DiagnosticsConfig;

pub use types::{
    Cadence, DiagnosticResult, EquipmentInfo, MaintenanceCheck, Reading, ReadingSource, ReadingSourcePreference,
    ReportKind, RiskLevel, SupplementalReport, WorkOrder, WorkOrderPriority,
};

pub use baseline::{AnomalyFinding, AnomalySeverity, BaselineEngine, StatisticalBaseline};
pub use diagnostics::{AnalysisMode, DiagnoseRequest, DiagnosticError, DiagnosticService, DiagnosticSession};
pub use orchestrator::{ConsensusAnalysis, DiagnosticOrchestrator, DiagnosticUnavailable};
pub use policy::{MaintenanceAction, TieredPolicyEngine};
pub use profiles::{resolve_profile, weibull_failure_probability, EquipmentFailureProfile, WeibullEstimate};
pub use quality::{DataQualityAssessment, DataQualityScorer, DataSource, QualityTier};
pub use storage::{DiagnosticStore, SledStore, StorageError};
