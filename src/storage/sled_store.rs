//! sled-backed `DiagnosticStore`

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{equipment_prefix, record_key, timestamp_key, DiagnosticStore, StorageError};
use crate::diagnostics::DiagnosticSession;
use crate::types::{EquipmentInfo, MaintenanceCheck, Reading, SupplementalReport};

/// One sled database with a tree per record kind.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    equipment: sled::Tree,
    readings: sled::Tree,
    checks: sled::Tree,
    reports: sled::Tree,
    sessions: sled::Tree,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Throwaway database removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            equipment: db.open_tree("equipment")?,
            readings: db.open_tree("readings")?,
            checks: db.open_tree("checks")?,
            reports: db.open_tree("reports")?,
            sessions: db.open_tree("sessions")?,
            db: Arc::new(db),
        })
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    pub fn put_equipment(&self, info: &EquipmentInfo) -> Result<(), StorageError> {
        equipment_prefix(&info.id)?;
        self.equipment.insert(info.id.as_bytes(), serde_json::to_vec(info)?)?;
        Ok(())
    }

    /// Insert a reading. A reading with the same equipment, sensor and
    /// timestamp replaces the stored one.
    pub fn insert_reading(&self, reading: &Reading) -> Result<(), StorageError> {
        let key = record_key(&reading.equipment_id, reading.timestamp, &reading.sensor_type)?;
        self.readings.insert(key, serde_json::to_vec(reading)?)?;
        Ok(())
    }

    pub fn insert_check(&self, check: &MaintenanceCheck) -> Result<(), StorageError> {
        let key = record_key(&check.equipment_id, check.performed_at, &check.id)?;
        self.checks.insert(key, serde_json::to_vec(check)?)?;
        Ok(())
    }

    pub fn insert_report(&self, report: &SupplementalReport) -> Result<(), StorageError> {
        let key = record_key(&report.equipment_id, report.recorded_at, &report.id)?;
        self.reports.insert(key, serde_json::to_vec(report)?)?;
        Ok(())
    }

    /// Ids of all registered equipment.
    pub fn equipment_ids(&self) -> Result<Vec<String>, StorageError> {
        self.equipment
            .iter()
            .keys()
            .map(|k| Ok(String::from_utf8_lossy(&k?).into_owned()))
            .collect()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Decode every value under `equipment_id`, starting at `since` if given.
    /// Undecodable records are skipped with a warning.
    fn scan<T: DeserializeOwned>(
        tree: &sled::Tree,
        equipment_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, StorageError> {
        let prefix = equipment_prefix(equipment_id)?;
        let mut start = prefix.clone();
        if let Some(ts) = since {
            start.extend_from_slice(&timestamp_key(ts));
        }
        // `id \x01` is the first key past every `id \0 …` key
        let mut end = prefix;
        if let Some(last) = end.last_mut() {
            *last = 1;
        }

        let mut out = Vec::new();
        for item in tree.range(start..end) {
            let (key, value) = item?;
            match serde_json::from_slice::<T>(&value) {
                Ok(record) => out.push(record),
                Err(e) => warn!(
                    tree = %String::from_utf8_lossy(&tree.name()),
                    key = ?key,
                    error = %e,
                    "Skipping undecodable record"
                ),
            }
        }
        Ok(out)
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(value)?)
    }
}

impl DiagnosticStore for SledStore {
    fn equipment(&self, equipment_id: &str) -> Result<Option<EquipmentInfo>, StorageError> {
        match self.equipment.get(equipment_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn readings(&self, equipment_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        Self::scan(&self.readings, equipment_id, Some(since))
    }

    fn maintenance_checks(&self, equipment_id: &str) -> Result<Vec<MaintenanceCheck>, StorageError> {
        let mut checks: Vec<MaintenanceCheck> = Self::scan(&self.checks, equipment_id, None)?;
        checks.reverse();
        Ok(checks)
    }

    fn supplemental_reports(&self, equipment_id: &str) -> Result<Vec<SupplementalReport>, StorageError> {
        Self::scan(&self.reports, equipment_id, None)
    }

    fn save_session(&self, session: &DiagnosticSession) -> Result<(), StorageError> {
        let key = record_key(&session.equipment_id, session.created_at, &session.id.to_string())?;
        self.sessions.insert(key, Self::encode(session)?)?;
        Ok(())
    }

    fn sessions(&self, equipment_id: &str, limit: usize) -> Result<Vec<DiagnosticSession>, StorageError> {
        let mut sessions: Vec<DiagnosticSession> = Self::scan(&self.sessions, equipment_id, None)?;
        sessions.reverse();
        sessions.truncate(limit);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cadence, ReadingSource, ReportKind};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn store() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_equipment_round_trip() {
        let (_dir, s) = store();
        assert!(s.equipment("AHU-1").unwrap().is_none());
        let mut info = EquipmentInfo::unknown("AHU-1");
        info.name = "Air Handler 1".to_string();
        s.put_equipment(&info).unwrap();
        assert_eq!(s.equipment("AHU-1").unwrap(), Some(info));
        assert_eq!(s.equipment_ids().unwrap(), vec!["AHU-1".to_string()]);
    }

    #[test]
    fn test_readings_window_and_isolation() {
        let (_dir, s) = store();
        for h in 0..5 {
            s.insert_reading(&Reading::new("AHU-1", "vibration", 0.1, "in/s", t0() + Duration::hours(h), ReadingSource::LiveSensor))
                .unwrap();
        }
        // Same prefix characters, different equipment
        s.insert_reading(&Reading::new("AHU-10", "vibration", 9.9, "in/s", t0(), ReadingSource::LiveSensor))
            .unwrap();

        let all = s.readings("AHU-1", t0() - Duration::days(1)).unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let recent = s.readings("AHU-1", t0() + Duration::hours(3)).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_checks_newest_first() {
        let (_dir, s) = store();
        for d in 0..3 {
            s.insert_check(&MaintenanceCheck {
                id: format!("c{d}"),
                equipment_id: "RTU-2".to_string(),
                cadence: Cadence::Daily,
                performed_at: t0() + Duration::days(d),
                technician: None,
                measurements: BTreeMap::new(),
                notes: None,
            })
            .unwrap();
        }
        let checks = s.maintenance_checks("RTU-2").unwrap();
        assert_eq!(checks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["c2", "c1", "c0"]);
    }

    #[test]
    fn test_reports() {
        let (_dir, s) = store();
        s.insert_report(&SupplementalReport {
            id: "r1".to_string(),
            equipment_id: "CH-1".to_string(),
            kind: ReportKind::Vibration,
            recorded_at: t0(),
            summary: "1x running speed elevated".to_string(),
        })
        .unwrap();
        assert_eq!(s.supplemental_reports("CH-1").unwrap().len(), 1);
        assert!(s.supplemental_reports("CH-2").unwrap().is_empty());
    }

    #[test]
    fn test_temporary_store() {
        let s = SledStore::temporary().unwrap();
        assert!(s.maintenance_checks("X").unwrap().is_empty());
    }
}
