//! Shared data structures for the predictive-maintenance diagnostic core
//!
//! - `reading`: typed readings and the source-preference policy
//! - `equipment`: asset records, maintenance checks, supplemental reports
//! - `diagnosis`: the terminal `DiagnosticResult` and its work order

mod diagnosis;
mod equipment;
mod reading;

pub use diagnosis::*;
pub use equipment::*;
pub use reading::*;
