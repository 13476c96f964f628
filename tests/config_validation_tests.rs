//! Config Validation Tests
//!
//! Typo detection (unknown keys with suggestions) and range validation,
//! exercised independently from the diagnostic pipeline.

use hvac_pdm::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use hvac_pdm::config::{ConfigError, DiagnosticsConfig};

// ============================================================================
// Typo detection
// ============================================================================

#[test]
fn typo_in_baseline_key_warns_with_suggestion() {
    let toml_str = r#"
[baseline]
min_sampels = 12
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("min_sampels"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("baseline.min_samples"));
}

#[test]
fn typo_in_nested_ai_section_warns() {
    let toml_str = r#"
[ai.anthropic]
modle = "claude-sonnet-4-5"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("ai.anthropic.model"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[analysis]
history_days = 180

[quality.weights]
sensor_readings = 0.30
manual_maintenance_logs = 0.20
refrigerant_reports = 0.15
vibration_analysis = 0.10
condenser_maintenance = 0.10
maintenance_history = 0.15

[policy]
critical_team = "Chiller Plant"

[[templates]]
sensor_type = "vibration"
unit = "in/s"
normal_min = 0.0
normal_max = 0.2
warning = 0.3
critical = 0.5
direction = "above"

[ai]
timeout_secs = 30
fallback_to_local = true
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn wildly_wrong_key_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely_unrelated_setting", &known).is_none());
}

// ============================================================================
// Range validation
// ============================================================================

#[test]
fn default_config_round_trips_through_toml() {
    let config = DiagnosticsConfig::default();
    let text = config.to_toml().unwrap();
    let parsed = DiagnosticsConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.templates.len(), config.templates.len());
    assert_eq!(parsed.policy.checks_window, config.policy.checks_window);
}

#[test]
fn weights_not_summing_to_one_are_rejected() {
    let toml_str = r#"
[quality.weights]
sensor_readings = 0.9
"#;
    match DiagnosticsConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("quality.weights")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn every_violation_is_collected() {
    let toml_str = r#"
[baseline]
high_z = 1.0
medium_z = 2.0

[ai]
temperature = 1.5
consensus_agreement_boost = 2.0
"#;
    match DiagnosticsConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.len() >= 3, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("descending")));
            assert!(errors.iter().any(|e| e.contains("temperature")));
            assert!(errors.iter().any(|e| e.contains("consensus_agreement_boost")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn inverted_template_is_rejected() {
    let toml_str = r#"
[[templates]]
sensor_type = "suction_pressure"
unit = "psi"
normal_min = 100.0
normal_max = 140.0
warning = 70.0
critical = 90.0
direction = "below"
"#;
    assert!(matches!(
        DiagnosticsConfig::from_toml_str(toml_str),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
        DiagnosticsConfig::from_toml_str("[baseline\nmin_samples = "),
        Err(ConfigError::Parse(..))
    ));
}
