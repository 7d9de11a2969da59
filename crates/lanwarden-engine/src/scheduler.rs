//! Scan scheduling - turns recurring `ScanSchedule`s into due-scan decisions
//!
//! The scheduler owns the schedule list and mutates it in place on each tick.
//! It decides *when* to scan; actually running the scan is the caller's job,
//! which keeps the tick loop trivially testable.

use lanwarden_common::store::{self, KvStore};
use lanwarden_core::{Error, Result, ScanSchedule};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub struct ScanScheduler {
    schedules: Vec<ScanSchedule>,
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanScheduler {
    pub fn new() -> Self {
        Self {
            schedules: Vec::new(),
        }
    }

    /// Add a schedule after validating it. Duplicate ids are rejected.
    pub fn add(&mut self, schedule: ScanSchedule) -> Result<()> {
        schedule.validate()?;
        if self.schedules.iter().any(|s| s.id == schedule.id) {
            return Err(Error::InvalidSchedule(format!(
                "duplicate schedule id {:?}",
                schedule.id
            )));
        }
        info!(
            "Schedule {:?} added (every {}s)",
            schedule.id, schedule.interval_seconds
        );
        self.schedules.push(schedule);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.schedules.len();
        self.schedules.retain(|s| s.id != id);
        before != self.schedules.len()
    }

    pub fn get(&self, id: &str) -> Option<&ScanSchedule> {
        self.schedules.iter().find(|s| s.id == id)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.schedules.iter_mut().find(|s| s.id == id) {
            Some(schedule) => {
                schedule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn schedules(&self) -> &[ScanSchedule] {
        &self.schedules
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Return clones of every schedule due at `now`, marking each as fired
    /// so the next tick plans from the new next_run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<ScanSchedule> {
        let mut due = Vec::new();
        for schedule in self.schedules.iter_mut() {
            if schedule.is_due(now) {
                schedule.mark_fired(now);
                debug!(
                    "Schedule {:?} due; next run {:?}",
                    schedule.id, schedule.next_run
                );
                due.push(schedule.clone());
            }
        }
        due
    }

    /// Load the schedule list from the store; an absent key is an empty list
    pub fn load(kv: &dyn KvStore) -> Result<Self> {
        let schedules: Vec<ScanSchedule> =
            store::get(kv, store::keys::SCHEDULES)?.unwrap_or_default();
        Ok(Self { schedules })
    }

    pub fn save(&self, kv: &dyn KvStore) -> Result<()> {
        store::put(kv, store::keys::SCHEDULES, &self.schedules)
    }
}
