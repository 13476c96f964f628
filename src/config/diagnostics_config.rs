//! Diagnostics Configuration - every diagnostic tunable as an operator-editable TOML value
//!
//! Each struct implements `Default` with the reference values, so an empty or
//! missing config file reproduces the standard behaviour exactly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, LOCAL_CONFIG_FILE, WEIGHT_SUM_TOLERANCE};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a diagnostics deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Analysis windows and prompt sizing
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Statistical baseline and anomaly scoring
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Data-quality weights and tier breakpoints
    #[serde(default)]
    pub quality: QualityConfig,

    /// Tiered maintenance policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Static per-sensor thresholds
    #[serde(default = "default_templates")]
    pub templates: Vec<SensorTemplate>,

    /// AI reasoning backends
    #[serde(default)]
    pub ai: AiConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent store
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            baseline: BaselineConfig::default(),
            quality: QualityConfig::default(),
            policy: PolicyConfig::default(),
            templates: default_templates(),
            ai: AiConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl DiagnosticsConfig {
    /// Load configuration using the standard search order:
    /// 1. `$HVAC_PDM_CONFIG`
    /// 2. `./hvac_pdm.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded diagnostics config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded diagnostics config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are warned about, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Find the static template for a sensor type, if one is configured.
    pub fn template_for(&self, sensor_type: &str) -> Option<&SensorTemplate> {
        self.templates.iter().find(|t| t.sensor_type == sensor_type)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Data-quality weights must sum to 1.0
    /// - Tier breakpoints must be descending (excellent >= good >= fair)
    /// - Severity z thresholds must be positive and descending
    /// - Template critical thresholds must be beyond warning thresholds
    /// - Timeouts and windows must be > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Baseline
        let b = &self.baseline;
        if b.min_samples < 2 {
            errors.push("baseline.min_samples must be >= 2 (stddev needs n-1 > 0)".to_string());
        }
        if b.low_z <= 0.0 {
            errors.push("baseline.low_z must be > 0".to_string());
        }
        if !(b.high_z >= b.medium_z && b.medium_z >= b.low_z) {
            errors.push(format!(
                "baseline z thresholds must be descending: high ({:.2}) >= medium ({:.2}) >= low ({:.2})",
                b.high_z, b.medium_z, b.low_z
            ));
        }
        if b.confidence_sample_divisor <= 0.0 || b.confidence_z_divisor <= 0.0 {
            errors.push("baseline confidence divisors must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&b.confidence_cap) {
            errors.push("baseline.confidence_cap must be within [0, 1]".to_string());
        }

        // Quality weights
        let w = &self.quality.weights;
        let weight_sum = w.sum();
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("quality.weights must sum to 1.0, got {weight_sum:.3}"));
        }
        for (name, value) in w.entries() {
            if value < 0.0 {
                errors.push(format!("quality.weights.{name} must be >= 0"));
            }
        }
        for (name, bp) in self.quality.breakpoints.entries() {
            if bp.good > bp.excellent {
                errors.push(format!("quality.breakpoints.{name}: good must be <= excellent"));
            }
            if let Some(fair) = bp.fair {
                if fair > bp.good {
                    errors.push(format!("quality.breakpoints.{name}: fair must be <= good"));
                }
            }
        }

        // Policy
        let p = &self.policy;
        if p.checks_window == 0 {
            errors.push("policy.checks_window must be > 0".to_string());
        }
        if p.daily_overdue_days <= 0 || p.weekly_overdue_days <= 0 || p.monthly_overdue_days <= 0 {
            errors.push("policy overdue day limits must be > 0".to_string());
        }

        // Templates
        for t in &self.templates {
            if t.normal_min > t.normal_max {
                errors.push(format!(
                    "templates.{}: normal_min ({}) must be <= normal_max ({})",
                    t.sensor_type, t.normal_min, t.normal_max
                ));
            }
            let escalates = match t.direction {
                ThresholdDirection::Above => t.critical >= t.warning,
                ThresholdDirection::Below => t.critical <= t.warning,
            };
            if !escalates {
                errors.push(format!(
                    "templates.{}: critical ({}) must be beyond warning ({}) for direction {:?}",
                    t.sensor_type, t.critical, t.warning, t.direction
                ));
            }
        }

        // AI
        let ai = &self.ai;
        if !(0.0..=1.0).contains(&ai.temperature) {
            errors.push(format!("ai.temperature ({:.2}) must be within [0, 1]", ai.temperature));
        }
        if ai.timeout_secs == 0 {
            errors.push("ai.timeout_secs must be > 0".to_string());
        }
        if !(1.0..=1.1).contains(&ai.consensus_agreement_boost) {
            errors.push(format!(
                "ai.consensus_agreement_boost ({:.3}) must be within [1.0, 1.1]",
                ai.consensus_agreement_boost
            ));
        }

        // Analysis
        if self.analysis.history_days <= 0 {
            errors.push("analysis.history_days must be > 0".to_string());
        }
        if !(0.0..=100.0).contains(&self.analysis.default_condition_pct) {
            errors.push("analysis.default_condition_pct must be within [0, 100]".to_string());
        }

        // Every float must be finite; walk the serialized tree so new fields are covered
        match toml::Value::try_from(self) {
            Ok(tree) => {
                let mut bad = Vec::new();
                collect_non_finite(&tree, "", &mut bad);
                for path in bad {
                    errors.push(format!("{path} must be a finite number"));
                }
            }
            Err(e) => errors.push(format!("config could not be serialized for validation: {e}")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Dotted paths of every float node in `value` that is NaN or infinite.
fn collect_non_finite(value: &toml::Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        toml::Value::Float(f) if !f.is_finite() => out.push(prefix.to_string()),
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                collect_non_finite(child, &path, out);
            }
        }
        toml::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_non_finite(child, &format!("{prefix}[{i}]"), out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Reading history pulled for baselining (days). A full year covers every
    /// month's seasonal factor.
    #[serde(default = "default_history_days")]
    pub history_days: i64,

    /// Window for counting recent manual maintenance logs (days).
    #[serde(default = "default_manual_log_window_days")]
    pub manual_log_window_days: i64,

    /// Most recent merged readings forwarded to the AI prompt.
    #[serde(default = "default_max_prompt_readings")]
    pub max_prompt_readings: usize,

    /// Condition assumed when the asset has no surveyed condition (%).
    #[serde(default = "default_condition_pct")]
    pub default_condition_pct: f64,
}

fn default_history_days() -> i64 { 365 }
fn default_manual_log_window_days() -> i64 { 90 }
fn default_max_prompt_readings() -> usize { 60 }
fn default_condition_pct() -> f64 { 70.0 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            manual_log_window_days: default_manual_log_window_days(),
            max_prompt_readings: default_max_prompt_readings(),
            default_condition_pct: default_condition_pct(),
        }
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// Statistical baseline and anomaly scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Minimum samples per parameter before a baseline is emitted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// |z| at or above this is a high-severity anomaly.
    #[serde(default = "default_high_z")]
    pub high_z: f64,

    /// |z| at or above this is a medium-severity anomaly.
    #[serde(default = "default_medium_z")]
    pub medium_z: f64,

    /// |z| at or above this is a low-severity anomaly; below it nothing is reported.
    #[serde(default = "default_low_z")]
    pub low_z: f64,

    /// Confidence = min(cap, base + n / sample_divisor + |z| / z_divisor)
    #[serde(default = "default_confidence_base")]
    pub confidence_base: f64,

    #[serde(default = "default_confidence_sample_divisor")]
    pub confidence_sample_divisor: f64,

    #[serde(default = "default_confidence_z_divisor")]
    pub confidence_z_divisor: f64,

    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,
}

fn default_min_samples() -> usize { 10 }
fn default_high_z() -> f64 { 3.0 }
fn default_medium_z() -> f64 { 2.0 }
fn default_low_z() -> f64 { 1.5 }
fn default_confidence_base() -> f64 { 0.5 }
fn default_confidence_sample_divisor() -> f64 { 100.0 }
fn default_confidence_z_divisor() -> f64 { 10.0 }
fn default_confidence_cap() -> f64 { 0.95 }

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            high_z: default_high_z(),
            medium_z: default_medium_z(),
            low_z: default_low_z(),
            confidence_base: default_confidence_base(),
            confidence_sample_divisor: default_confidence_sample_divisor(),
            confidence_z_divisor: default_confidence_z_divisor(),
            confidence_cap: default_confidence_cap(),
        }
    }
}

// ============================================================================
// Data Quality
// ============================================================================

/// Data-quality scoring: per-source weights, count breakpoints and tier scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub weights: SourceWeights,

    #[serde(default)]
    pub breakpoints: SourceBreakpoints,

    #[serde(default)]
    pub tier_scores: TierScores,
}

/// Weight of each supplemental data source. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWeights {
    #[serde(default = "default_w_sensor")]
    pub sensor_readings: f64,
    #[serde(default = "default_w_manual")]
    pub manual_maintenance_logs: f64,
    #[serde(default = "default_w_refrigerant")]
    pub refrigerant_reports: f64,
    #[serde(default = "default_w_vibration")]
    pub vibration_analysis: f64,
    #[serde(default = "default_w_condenser")]
    pub condenser_maintenance: f64,
    #[serde(default = "default_w_history")]
    pub maintenance_history: f64,
}

fn default_w_sensor() -> f64 { 0.25 }
fn default_w_manual() -> f64 { 0.20 }
fn default_w_refrigerant() -> f64 { 0.15 }
fn default_w_vibration() -> f64 { 0.20 }
fn default_w_condenser() -> f64 { 0.10 }
fn default_w_history() -> f64 { 0.10 }

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            sensor_readings: default_w_sensor(),
            manual_maintenance_logs: default_w_manual(),
            refrigerant_reports: default_w_refrigerant(),
            vibration_analysis: default_w_vibration(),
            condenser_maintenance: default_w_condenser(),
            maintenance_history: default_w_history(),
        }
    }
}

impl SourceWeights {
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("sensor_readings", self.sensor_readings),
            ("manual_maintenance_logs", self.manual_maintenance_logs),
            ("refrigerant_reports", self.refrigerant_reports),
            ("vibration_analysis", self.vibration_analysis),
            ("condenser_maintenance", self.condenser_maintenance),
            ("maintenance_history", self.maintenance_history),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.entries().iter().map(|(_, w)| w).sum()
    }
}

/// Minimum record counts for each quality tier. `fair = None` means the
/// source jumps straight from good to poor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakpoints {
    pub excellent: u32,
    pub good: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair: Option<u32>,
}

impl TierBreakpoints {
    pub const fn new(excellent: u32, good: u32, fair: Option<u32>) -> Self {
        Self { excellent, good, fair }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBreakpoints {
    #[serde(default = "default_bp_sensor")]
    pub sensor_readings: TierBreakpoints,
    #[serde(default = "default_bp_manual")]
    pub manual_maintenance_logs: TierBreakpoints,
    #[serde(default = "default_bp_refrigerant")]
    pub refrigerant_reports: TierBreakpoints,
    #[serde(default = "default_bp_vibration")]
    pub vibration_analysis: TierBreakpoints,
    #[serde(default = "default_bp_condenser")]
    pub condenser_maintenance: TierBreakpoints,
    #[serde(default = "default_bp_history")]
    pub maintenance_history: TierBreakpoints,
}

fn default_bp_sensor() -> TierBreakpoints { TierBreakpoints::new(20, 10, Some(5)) }
fn default_bp_manual() -> TierBreakpoints { TierBreakpoints::new(10, 5, Some(2)) }
fn default_bp_refrigerant() -> TierBreakpoints { TierBreakpoints::new(3, 2, Some(1)) }
fn default_bp_vibration() -> TierBreakpoints { TierBreakpoints::new(2, 1, None) }
fn default_bp_condenser() -> TierBreakpoints { TierBreakpoints::new(3, 2, Some(1)) }
fn default_bp_history() -> TierBreakpoints { TierBreakpoints::new(24, 12, Some(4)) }

impl Default for SourceBreakpoints {
    fn default() -> Self {
        Self {
            sensor_readings: default_bp_sensor(),
            manual_maintenance_logs: default_bp_manual(),
            refrigerant_reports: default_bp_refrigerant(),
            vibration_analysis: default_bp_vibration(),
            condenser_maintenance: default_bp_condenser(),
            maintenance_history: default_bp_history(),
        }
    }
}

impl SourceBreakpoints {
    pub fn entries(&self) -> [(&'static str, TierBreakpoints); 6] {
        [
            ("sensor_readings", self.sensor_readings),
            ("manual_maintenance_logs", self.manual_maintenance_logs),
            ("refrigerant_reports", self.refrigerant_reports),
            ("vibration_analysis", self.vibration_analysis),
            ("condenser_maintenance", self.condenser_maintenance),
            ("maintenance_history", self.maintenance_history),
        ]
    }
}

/// Numeric score for each quality tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierScores {
    #[serde(default = "default_score_excellent")]
    pub excellent: f64,
    #[serde(default = "default_score_good")]
    pub good: f64,
    #[serde(default = "default_score_fair")]
    pub fair: f64,
    #[serde(default = "default_score_poor")]
    pub poor: f64,
}

fn default_score_excellent() -> f64 { 1.0 }
fn default_score_good() -> f64 { 0.8 }
fn default_score_fair() -> f64 { 0.6 }
fn default_score_poor() -> f64 { 0.3 }

impl Default for TierScores {
    fn default() -> Self {
        Self {
            excellent: default_score_excellent(),
            good: default_score_good(),
            fair: default_score_fair(),
            poor: default_score_poor(),
        }
    }
}

// ============================================================================
// Tiered Maintenance Policy
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Most recent maintenance checks considered for the frequency snapshot.
    #[serde(default = "default_checks_window")]
    pub checks_window: usize,

    #[serde(default = "default_daily_overdue")]
    pub daily_overdue_days: i64,
    #[serde(default = "default_weekly_overdue")]
    pub weekly_overdue_days: i64,
    #[serde(default = "default_monthly_overdue")]
    pub monthly_overdue_days: i64,

    /// Below this many daily checks (and below `limited_min_weekly` weekly
    /// checks) the data is considered limited.
    #[serde(default = "default_limited_min_daily")]
    pub limited_min_daily: usize,
    #[serde(default = "default_limited_min_weekly")]
    pub limited_min_weekly: usize,

    #[serde(default = "default_critical_due_hours")]
    pub critical_due_hours: u32,
    #[serde(default = "default_warning_due_hours")]
    pub warning_due_hours: u32,

    #[serde(default = "default_critical_team")]
    pub critical_team: String,
    #[serde(default = "default_warning_team")]
    pub warning_team: String,

    /// Confidence reported by the local path with limited / sufficient data.
    #[serde(default = "default_limited_confidence")]
    pub limited_data_confidence: f64,
    #[serde(default = "default_sufficient_confidence")]
    pub sufficient_data_confidence: f64,
}

fn default_checks_window() -> usize { 10 }
fn default_daily_overdue() -> i64 { 2 }
fn default_weekly_overdue() -> i64 { 8 }
fn default_monthly_overdue() -> i64 { 35 }
fn default_limited_min_daily() -> usize { 3 }
fn default_limited_min_weekly() -> usize { 2 }
fn default_critical_due_hours() -> u32 { 4 }
fn default_warning_due_hours() -> u32 { 48 }
fn default_critical_team() -> String { "HVAC Emergency Response".to_string() }
fn default_warning_team() -> String { "HVAC Preventive Maintenance".to_string() }
fn default_limited_confidence() -> f64 { 0.5 }
fn default_sufficient_confidence() -> f64 { 0.8 }

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            checks_window: default_checks_window(),
            daily_overdue_days: default_daily_overdue(),
            weekly_overdue_days: default_weekly_overdue(),
            monthly_overdue_days: default_monthly_overdue(),
            limited_min_daily: default_limited_min_daily(),
            limited_min_weekly: default_limited_min_weekly(),
            critical_due_hours: default_critical_due_hours(),
            warning_due_hours: default_warning_due_hours(),
            critical_team: default_critical_team(),
            warning_team: default_warning_team(),
            limited_data_confidence: default_limited_confidence(),
            sufficient_data_confidence: default_sufficient_confidence(),
        }
    }
}

// ============================================================================
// Sensor Templates
// ============================================================================

/// Which side of the normal range is dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdDirection {
    /// Higher values are worse (temperatures, current, vibration)
    #[default]
    Above,
    /// Lower values are worse (suction pressure, oil pressure)
    Below,
}

/// Static thresholds for one sensor type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTemplate {
    pub sensor_type: String,
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    pub warning: f64,
    pub critical: f64,
    #[serde(default)]
    pub direction: ThresholdDirection,
}

impl SensorTemplate {
    fn above(sensor_type: &str, unit: &str, normal: (f64, f64), warning: f64, critical: f64) -> Self {
        Self {
            sensor_type: sensor_type.to_string(),
            unit: unit.to_string(),
            normal_min: normal.0,
            normal_max: normal.1,
            warning,
            critical,
            direction: ThresholdDirection::Above,
        }
    }

    fn below(sensor_type: &str, unit: &str, normal: (f64, f64), warning: f64, critical: f64) -> Self {
        Self {
            direction: ThresholdDirection::Below,
            ..Self::above(sensor_type, unit, normal, warning, critical)
        }
    }
}

pub fn default_templates() -> Vec<SensorTemplate> {
    vec![
        SensorTemplate::above("supply_air_temperature", "°F", (50.0, 60.0), 65.0, 72.0),
        SensorTemplate::above("return_air_temperature", "°F", (68.0, 78.0), 82.0, 88.0),
        SensorTemplate::above("discharge_pressure", "psi", (200.0, 300.0), 380.0, 450.0),
        SensorTemplate::below("suction_pressure", "psi", (100.0, 140.0), 90.0, 70.0),
        SensorTemplate::above("motor_current", "A", (5.0, 35.0), 40.0, 48.0),
        SensorTemplate::above("vibration", "in/s", (0.0, 0.15), 0.3, 0.5),
        SensorTemplate::above("filter_pressure_drop", "inWC", (0.1, 0.8), 1.0, 1.5),
        SensorTemplate::above("chilled_water_supply_temperature", "°F", (42.0, 46.0), 50.0, 55.0),
        SensorTemplate::above("condenser_approach", "°F", (2.0, 5.0), 8.0, 12.0),
        SensorTemplate::below("oil_pressure", "psi", (40.0, 60.0), 30.0, 20.0),
    ]
}

// ============================================================================
// AI Backends
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Sampling temperature sent to every backend; low for determinism.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-backend timeout (seconds). Each backend gets its own budget.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    /// Multiplier applied to consensus confidence when all models agree on
    /// risk. 1.0 disables the boost.
    #[serde(default = "default_agreement_boost")]
    pub consensus_agreement_boost: f64,

    /// Run the local policy engine when no backend succeeds.
    #[serde(default = "default_fallback_to_local")]
    pub fallback_to_local: bool,

    #[serde(default = "default_openai_endpoint")]
    pub openai: BackendEndpoint,

    #[serde(default = "default_anthropic_endpoint")]
    pub anthropic: BackendEndpoint,
}

fn default_temperature() -> f64 { 0.1 }
fn default_max_tokens() -> u32 { 1500 }
fn default_ai_timeout() -> u64 { 45 }
fn default_agreement_boost() -> f64 { 1.0 }
fn default_fallback_to_local() -> bool { true }

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_ai_timeout(),
            consensus_agreement_boost: default_agreement_boost(),
            fallback_to_local: default_fallback_to_local(),
            openai: default_openai_endpoint(),
            anthropic: default_anthropic_endpoint(),
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

fn default_true() -> bool { true }

fn default_openai_endpoint() -> BackendEndpoint {
    BackendEndpoint {
        enabled: true,
        base_url: "https://api.openai.com".to_string(),
        model: "gpt-4o".to_string(),
        api_key_env: "OPENAI_API_KEY".to_string(),
    }
}

fn default_anthropic_endpoint() -> BackendEndpoint {
    BackendEndpoint {
        enabled: true,
        base_url: "https://api.anthropic.com".to_string(),
        model: "claude-sonnet-4-5".to_string(),
        api_key_env: "ANTHROPIC_API_KEY".to_string(),
    }
}

// ============================================================================
// Server / Storage
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Can be overridden by the `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory. Can be overridden by `--db`.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "data/hvac_pdm.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================
