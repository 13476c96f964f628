//! Storage collaborator
//!
//! The diagnostic core only needs query-by-equipment-id, filter-by-time and
//! order-by-timestamp reads plus a single session write. `DiagnosticStore`
//! is that contract; `SledStore` is the embedded implementation.
//!
//! ## Key layout
//!
//! Every tree is keyed `equipment_id \0 timestamp(8 bytes BE) suffix` so a
//! prefix scan returns one equipment's records in chronological order.
//! Timestamps are millisecond `i64` with the sign bit flipped, which keeps
//! big-endian byte order equal to numeric order for pre-1970 values too.

mod sled_store;

pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::diagnostics::DiagnosticSession;
use crate::types::{EquipmentInfo, MaintenanceCheck, Reading, SupplementalReport};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Read access to equipment data plus the session sink.
///
/// Implementations need no transactions or locking; concurrent session
/// writes for the same equipment are last-write-wins.
pub trait DiagnosticStore: Send + Sync {
    fn equipment(&self, equipment_id: &str) -> Result<Option<EquipmentInfo>, StorageError>;

    /// Readings at or after `since`, oldest first.
    fn readings(&self, equipment_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError>;

    /// All maintenance checks, newest first.
    fn maintenance_checks(&self, equipment_id: &str) -> Result<Vec<MaintenanceCheck>, StorageError>;

    fn supplemental_reports(&self, equipment_id: &str) -> Result<Vec<SupplementalReport>, StorageError>;

    fn save_session(&self, session: &DiagnosticSession) -> Result<(), StorageError>;

    /// Most recent sessions, newest first.
    fn sessions(&self, equipment_id: &str, limit: usize) -> Result<Vec<DiagnosticSession>, StorageError>;
}

// ============================================================================
// Key encoding
// ============================================================================

/// Order-preserving 8-byte encoding of a timestamp.
pub(crate) fn timestamp_key(ts: DateTime<Utc>) -> [u8; 8] {
    ((ts.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

/// `equipment_id \0`
pub(crate) fn equipment_prefix(equipment_id: &str) -> Result<Vec<u8>, StorageError> {
    if equipment_id.is_empty() || equipment_id.contains('\0') {
        return Err(StorageError::InvalidKey(format!("{equipment_id:?}")));
    }
    let mut prefix = Vec::with_capacity(equipment_id.len() + 1);
    prefix.extend_from_slice(equipment_id.as_bytes());
    prefix.push(0);
    Ok(prefix)
}

pub(crate) fn record_key(equipment_id: &str, ts: DateTime<Utc>, suffix: &str) -> Result<Vec<u8>, StorageError> {
    let mut key = equipment_prefix(equipment_id)?;
    key.extend_from_slice(&timestamp_key(ts));
    key.extend_from_slice(suffix.as_bytes());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_key_orders_like_time() {
        let times = [
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap(),
        ];
        for pair in times.windows(2) {
            assert!(timestamp_key(pair[0]) < timestamp_key(pair[1]));
        }
    }

    #[test]
    fn test_invalid_equipment_ids() {
        assert!(equipment_prefix("").is_err());
        assert!(equipment_prefix("a\0b").is_err());
        assert_eq!(equipment_prefix("AHU-1").unwrap(), b"AHU-1\0".to_vec());
    }
}
