//! Weibull reliability model
//!
//! Failure probability by age for a profile's typical life, adjusted for the
//! observed equipment condition:
//!
//!   condition_factor = 0.5 + condition% / 100        (0.5 – 1.5)
//!   adjusted_age     = age / condition_factor
//!   P(fail)          = 1 - exp(-(adjusted_age / λ)^k),  k = 2.5, λ = typical life
//!
//! The CDF is evaluated with statrs.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Weibull};
use tracing::warn;

use super::EquipmentFailureProfile;
use crate::config::defaults::{MAX_REPORTED_CONFIDENCE, WEIBULL_SHAPE};

/// Result of a Weibull evaluation for one piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeibullEstimate {
    /// Probability of failure by the current (condition-adjusted) age, 0.0 – 1.0
    pub probability: f64,
    /// 0.5 – 0.95, grows with the condition rating
    pub confidence: f64,
    /// Scale parameter stretched by the condition factor
    pub characteristic_life_years: f64,
    /// Years until the condition-adjusted median life, never negative
    pub remaining_life_years: f64,
}

/// Condition factor in `[0.5, 1.5]` for a condition rating in percent.
pub fn condition_factor(condition_pct: f64) -> f64 {
    0.5 + sanitize_condition(condition_pct) / 100.0
}

fn sanitize_condition(condition_pct: f64) -> f64 {
    if condition_pct.is_finite() {
        condition_pct.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Weibull failure probability for `age_years` against `profile`.
///
/// Total over its inputs: negative or non-finite ages are treated as new
/// equipment and an unusable scale yields probability 0.
pub fn weibull_failure_probability(
    age_years: f64,
    profile: &EquipmentFailureProfile,
    condition_pct: f64,
) -> WeibullEstimate {
    let condition = sanitize_condition(condition_pct);
    let factor = condition_factor(condition);
    let age = if age_years.is_finite() { age_years.max(0.0) } else { 0.0 };
    let adjusted_age = age / factor;
    let scale = profile.typical_life_years;

    let probability = match Weibull::new(WEIBULL_SHAPE, scale) {
        Ok(dist) => dist.cdf(adjusted_age).clamp(0.0, 1.0),
        Err(e) => {
            warn!(
                equipment_type = %profile.equipment_type,
                scale,
                error = %e,
                "Invalid Weibull scale, reporting zero failure probability"
            );
            0.0
        }
    };

    let characteristic_life = if scale.is_finite() && scale > 0.0 { scale * factor } else { 0.0 };
    let median_life = characteristic_life * std::f64::consts::LN_2.powf(1.0 / WEIBULL_SHAPE);

    WeibullEstimate {
        probability,
        confidence: (0.5 + condition / 200.0).min(MAX_REPORTED_CONFIDENCE),
        characteristic_life_years: characteristic_life,
        remaining_life_years: (median_life - age).max(0.0),
    }
}
