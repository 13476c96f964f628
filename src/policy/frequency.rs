//! Maintenance frequency snapshot
//!
//! How recently, and how often, each check cadence was performed within the
//! most recent `checks_window` maintenance checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::types::{Cadence, MaintenanceCheck};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceFrequencySnapshot {
    /// Whole days since the last check of each cadence; `None` if never performed
    pub days_since_daily: Option<i64>,
    pub days_since_weekly: Option<i64>,
    pub days_since_monthly: Option<i64>,

    pub daily_checks: usize,
    pub weekly_checks: usize,
    pub monthly_checks: usize,

    pub daily_overdue: bool,
    pub weekly_overdue: bool,
    pub monthly_overdue: bool,
}

impl MaintenanceFrequencySnapshot {
    /// Build the snapshot from the newest `config.checks_window` checks.
    ///
    /// `checks` may be in any order. A cadence that was never performed is
    /// overdue.
    pub fn from_checks(checks: &[MaintenanceCheck], now: DateTime<Utc>, config: &PolicyConfig) -> Self {
        let mut recent: Vec<&MaintenanceCheck> = checks.iter().collect();
        recent.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));
        recent.truncate(config.checks_window);

        let last = |cadence: Cadence| {
            recent
                .iter()
                .filter(|c| c.cadence == cadence)
                .map(|c| c.performed_at)
                .max()
                .map(|at| (now - at).num_days().max(0))
        };
        let count = |cadence: Cadence| recent.iter().filter(|c| c.cadence == cadence).count();
        let overdue = |days: Option<i64>, limit: i64| days.map_or(true, |d| d > limit);

        let days_since_daily = last(Cadence::Daily);
        let days_since_weekly = last(Cadence::Weekly);
        let days_since_monthly = last(Cadence::Monthly);

        Self {
            days_since_daily,
            days_since_weekly,
            days_since_monthly,
            daily_checks: count(Cadence::Daily),
            weekly_checks: count(Cadence::Weekly),
            monthly_checks: count(Cadence::Monthly),
            daily_overdue: overdue(days_since_daily, config.daily_overdue_days),
            weekly_overdue: overdue(days_since_weekly, config.weekly_overdue_days),
            monthly_overdue: overdue(days_since_monthly, config.monthly_overdue_days),
        }
    }

    /// Too few daily *and* weekly checks to trust a critical alert.
    pub fn has_limited_data(&self, config: &PolicyConfig) -> bool {
        self.daily_checks < config.limited_min_daily && self.weekly_checks < config.limited_min_weekly
    }

    /// Names of the overdue cadences, for messages.
    pub fn overdue_cadences(&self) -> Vec<&'static str> {
        [
            (self.daily_overdue, "daily"),
            (self.weekly_overdue, "weekly"),
            (self.monthly_overdue, "monthly"),
        ]
        .into_iter()
        .filter_map(|(overdue, name)| overdue.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 12, 0, 0).unwrap()
    }

    fn check(cadence: Cadence, days_ago: i64) -> MaintenanceCheck {
        MaintenanceCheck {
            id: format!("{cadence}-{days_ago}"),
            equipment_id: "AHU-1".to_string(),
            cadence,
            performed_at: now() - Duration::days(days_ago),
            technician: None,
            measurements: BTreeMap::new(),
            notes: None,
        }
    }

    #[test]
    fn test_overdue_thresholds() {
        let cfg = PolicyConfig::default();
        let checks = vec![
            check(Cadence::Daily, 2),
            check(Cadence::Weekly, 9),
            check(Cadence::Monthly, 35),
        ];
        let s = MaintenanceFrequencySnapshot::from_checks(&checks, now(), &cfg);
        assert_eq!(s.days_since_daily, Some(2));
        assert!(!s.daily_overdue);
        assert!(s.weekly_overdue);
        assert!(!s.monthly_overdue);
        assert_eq!(s.overdue_cadences(), vec!["weekly"]);
    }

    #[test]
    fn test_never_performed_is_overdue() {
        let cfg = PolicyConfig::default();
        let s = MaintenanceFrequencySnapshot::from_checks(&[check(Cadence::Daily, 0)], now(), &cfg);
        assert_eq!(s.days_since_monthly, None);
        assert!(s.monthly_overdue);
        assert!(s.weekly_overdue);
        assert!(!s.daily_overdue);
    }

    #[test]
    fn test_window_keeps_newest_checks() {
        let cfg = PolicyConfig::default();
        // 12 daily checks, then an old monthly check outside the 10-check window
        let mut checks: Vec<MaintenanceCheck> = (0..12).map(|d| check(Cadence::Daily, d)).collect();
        checks.push(check(Cadence::Monthly, 20));
        let s = MaintenanceFrequencySnapshot::from_checks(&checks, now(), &cfg);
        assert_eq!(s.daily_checks, 10);
        assert_eq!(s.monthly_checks, 0);
        assert!(s.monthly_overdue);
    }

    #[test]
    fn test_limited_data() {
        let cfg = PolicyConfig::default();
        let few = vec![check(Cadence::Daily, 0), check(Cadence::Daily, 1), check(Cadence::Weekly, 3)];
        assert!(MaintenanceFrequencySnapshot::from_checks(&few, now(), &cfg).has_limited_data(&cfg));

        let enough_weekly = vec![check(Cadence::Weekly, 1), check(Cadence::Weekly, 8)];
        assert!(!MaintenanceFrequencySnapshot::from_checks(&enough_weekly, now(), &cfg).has_limited_data(&cfg));
    }
}
