//! Recurring scan schedules
//!
//! A `ScanSchedule` is user-created configuration, mutated on each scheduler
//! tick and persisted as JSON through the injected store. Its lifecycle is
//! independent of any `Device`.

use crate::error::{Error, Result};
use crate::target::ScanMode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A recurring scan definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSchedule {
    /// Caller-supplied stable identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Whether the scheduler should fire this schedule
    pub enabled: bool,
    /// Scan thoroughness to use when fired
    pub scan_type: ScanMode,
    /// Interval between runs, in seconds
    pub interval_seconds: u64,
    /// When this schedule last fired
    pub last_run: Option<DateTime<Utc>>,
    /// Next planned firing time
    pub next_run: Option<DateTime<Utc>>,
}

impl ScanSchedule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, interval_seconds: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            scan_type: ScanMode::Quick,
            interval_seconds,
            last_run: None,
            next_run: None,
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.scan_type = mode;
        self
    }

    /// Validate before first use
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidSchedule(String::from("empty id")));
        }
        if self.interval_seconds == 0 {
            return Err(Error::InvalidSchedule(format!(
                "schedule {:?} has zero interval",
                self.id
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_seconds as i64)
    }

    /// Whether this schedule is due at `now`. A schedule that never ran and
    /// has no planned next_run is due immediately once enabled.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_run {
            Some(next) => now >= next,
            None => true,
        }
    }

    /// Record a firing and plan the next one
    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.next_run = Some(now + self.interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_schedule_is_due() {
        let schedule = ScanSchedule::new("nightly", "Nightly quick scan", 3600);
        assert!(schedule.is_due(Utc::now()));
    }

    #[test]
    fn test_disabled_schedule_never_due() {
        let mut schedule = ScanSchedule::new("nightly", "Nightly quick scan", 3600);
        schedule.enabled = false;
        assert!(!schedule.is_due(Utc::now()));
    }

    #[test]
    fn test_mark_fired_plans_next_run() {
        let mut schedule = ScanSchedule::new("hourly", "Hourly", 3600);
        let now = Utc::now();
        schedule.mark_fired(now);

        assert_eq!(schedule.last_run, Some(now));
        assert_eq!(schedule.next_run, Some(now + Duration::seconds(3600)));
        assert!(!schedule.is_due(now));
        assert!(schedule.is_due(now + Duration::seconds(3601)));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let schedule = ScanSchedule::new("bad", "Bad", 0);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_schedule_serde_roundtrip() {
        let mut schedule =
            ScanSchedule::new("weekly", "Weekly deep scan", 604_800).with_mode(ScanMode::Comprehensive);
        schedule.mark_fired(Utc::now());

        let json = serde_json::to_string(&schedule).unwrap();
        let back: ScanSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "weekly");
        assert_eq!(back.scan_type, ScanMode::Comprehensive);
        assert_eq!(back.last_run, schedule.last_run);
    }
}
