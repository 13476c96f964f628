//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const SOURCE_NAMES: [&str; 6] = [
    "sensor_readings",
    "manual_maintenance_logs",
    "refrigerant_reports",
    "vibration_analysis",
    "condenser_maintenance",
    "maintenance_history",
];

/// Returns the complete set of valid dotted key paths for `DiagnosticsConfig`.
///
/// Maintained by hand to match the struct hierarchy in diagnostics_config.rs.
/// Array-of-tables entries (`[[templates]]`) are not walked, so template
/// fields are not listed.
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [analysis]
        "analysis",
        "analysis.history_days",
        "analysis.manual_log_window_days",
        "analysis.max_prompt_readings",
        "analysis.default_condition_pct",
        // [baseline]
        "baseline",
        "baseline.min_samples",
        "baseline.high_z",
        "baseline.medium_z",
        "baseline.low_z",
        "baseline.confidence_base",
        "baseline.confidence_sample_divisor",
        "baseline.confidence_z_divisor",
        "baseline.confidence_cap",
        // [quality]
        "quality",
        "quality.weights",
        "quality.breakpoints",
        "quality.tier_scores",
        "quality.tier_scores.excellent",
        "quality.tier_scores.good",
        "quality.tier_scores.fair",
        "quality.tier_scores.poor",
        // [policy]
        "policy",
        "policy.checks_window",
        "policy.daily_overdue_days",
        "policy.weekly_overdue_days",
        "policy.monthly_overdue_days",
        "policy.limited_min_daily",
        "policy.limited_min_weekly",
        "policy.critical_due_hours",
        "policy.warning_due_hours",
        "policy.critical_team",
        "policy.warning_team",
        "policy.limited_data_confidence",
        "policy.sufficient_data_confidence",
        // [[templates]]
        "templates",
        // [ai]
        "ai",
        "ai.temperature",
        "ai.max_tokens",
        "ai.timeout_secs",
        "ai.consensus_agreement_boost",
        "ai.fallback_to_local",
        // [server]
        "server",
        "server.addr",
        // [storage]
        "storage",
        "storage.path",
    ];

    let mut keys: HashSet<String> = fixed.iter().map(|k| (*k).to_string()).collect();

    for source in SOURCE_NAMES {
        keys.insert(format!("quality.weights.{source}"));
        let bp = format!("quality.breakpoints.{source}");
        for field in ["excellent", "good", "fair"] {
            keys.insert(format!("{bp}.{field}"));
        }
        keys.insert(bp);
    }

    for provider in ["openai", "anthropic"] {
        let base = format!("ai.{provider}");
        for field in ["enabled", "base_url", "model", "api_key_env"] {
            keys.insert(format!("{base}.{field}"));
        }
        keys.insert(base);
    }

    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("min_sampels", "min_samples"), 2);
        assert_eq!(levenshtein("hig_z", "high_z"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [quality.weights]
            sensor_readings = 0.25
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"quality".to_string()));
        assert!(keys.contains(&"quality.weights".to_string()));
        assert!(keys.contains(&"quality.weights.sensor_readings".to_string()));
    }

    #[test]
    fn test_known_keys_are_silent() {
        let raw = r#"
            [baseline]
            min_samples = 12

            [quality.breakpoints.vibration_analysis]
            excellent = 3
            good = 1

            [ai.openai]
            model = "gpt-4o-mini"
        "#;
        let warnings = validate_unknown_keys(raw);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_typo_gets_suggestion() {
        let raw = r#"
            [baseline]
            hig_z = 3.5
        "#;
        let warnings = validate_unknown_keys(raw);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "baseline.hig_z");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("baseline.high_z"));
    }

    #[test]
    fn test_unparseable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[[[ not toml").is_empty());
    }
}
