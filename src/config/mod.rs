//! Diagnostics Configuration Module
//!
//! Every tunable of the diagnostic core (baseline thresholds, data-quality
//! weights, policy cadences, sensor templates, AI backend settings) lives in one
//! `DiagnosticsConfig` loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `HVAC_PDM_CONFIG` environment variable (path to TOML file)
//! 2. `hvac_pdm.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The config is passed explicitly (usually as `Arc<DiagnosticsConfig>`) into
//! the engines that need it; there is no global instance.

mod diagnostics_config;
pub mod defaults;
pub mod validation;

pub use diagnostics_config::*;
