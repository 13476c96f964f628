//! Reading acquisition and normalization
//!
//! - `extract`: maintenance-check columns → `DerivedFromCheck` readings
//! - `normalizer`: source-preference merge of live and derived readings

pub mod extract;
pub mod normalizer;

pub use extract::{canonical_column, derive_readings};
pub use normalizer::{latest_per_sensor, merge, split_latest};
