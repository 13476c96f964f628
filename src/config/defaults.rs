//! System-wide default constants.
//!
//! Values that are not operator-tunable through the TOML file.

// ============================================================================
// Configuration discovery
// ============================================================================

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "HVAC_PDM_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "hvac_pdm.toml";

// ============================================================================
// Weibull reliability model
// ============================================================================

/// Fixed Weibull shape parameter (wear-out regime, k > 1).
pub const WEIBULL_SHAPE: f64 = 2.5;

/// Upper bound for any reported confidence value.
pub const MAX_REPORTED_CONFIDENCE: f64 = 0.95;

/// Team assigned to model-proposed work orders that name none.
pub const DEFAULT_AI_ASSIGNED_TEAM: &str = "HVAC Maintenance";

// ============================================================================
// Validation tolerances
// ============================================================================

/// Allowed deviation of the data-quality weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

// ============================================================================
// Storage
// ============================================================================

/// Maximum sessions returned by a single listing call.
pub const MAX_SESSION_LISTING: usize = 200;
