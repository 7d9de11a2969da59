//! Uptime tracking - per-device availability history
//!
//! Each device gets a bounded ring of observations; once the ring is full the
//! oldest observation falls off. Updates go through the owning tracker so
//! records are never copied out, mutated, and written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Default observation ring capacity per device
pub const DEFAULT_CAPACITY: usize = 1000;

/// One availability sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub was_online: bool,
    /// Connect round-trip when the device answered
    pub response_time: Option<Duration>,
}

/// Reliability bands derived from the uptime percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    Excellent,
    Good,
    Fair,
    Poor,
    Unstable,
}

impl Reliability {
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 99.0 {
            Reliability::Excellent
        } else if pct >= 95.0 {
            Reliability::Good
        } else if pct >= 85.0 {
            Reliability::Fair
        } else if pct >= 70.0 {
            Reliability::Poor
        } else {
            Reliability::Unstable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reliability::Excellent => "Excellent",
            Reliability::Good => "Good",
            Reliability::Fair => "Fair",
            Reliability::Poor => "Poor",
            Reliability::Unstable => "Unstable",
        }
    }
}

/// A contiguous run of offline observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub start: DateTime<Utc>,
    /// End of the run; for an ongoing outage this is the query time
    pub end: DateTime<Utc>,
    /// Whether the device was still offline at the last observation
    pub ongoing: bool,
}

impl DowntimeEvent {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Availability history for one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeRecord {
    observations: VecDeque<Observation>,
    capacity: usize,
}

impl UptimeRecord {
    pub fn new(capacity: usize) -> Self {
        Self {
            observations: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    fn push(&mut self, observation: Observation) {
        if self.observations.len() == self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Share of online observations, in [0, 100]. An empty record is 0.
    pub fn uptime_percentage(&self) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let online = self.observations.iter().filter(|o| o.was_online).count();
        online as f64 / self.observations.len() as f64 * 100.0
    }

    pub fn reliability(&self) -> Reliability {
        Reliability::from_percentage(self.uptime_percentage())
    }

    /// Mean response time across online observations that carried one
    pub fn average_response_time(&self) -> Option<Duration> {
        let samples: Vec<Duration> = self
            .observations
            .iter()
            .filter_map(|o| o.response_time)
            .collect();
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }

    /// Coalesce consecutive offline observations into downtime events. A
    /// trailing offline run is ongoing and ends at `now`.
    pub fn downtime_events(&self, now: DateTime<Utc>) -> Vec<DowntimeEvent> {
        let mut events = Vec::new();
        let mut run_start: Option<DateTime<Utc>> = None;

        for observation in &self.observations {
            match (observation.was_online, run_start) {
                (false, None) => run_start = Some(observation.timestamp),
                (true, Some(start)) => {
                    events.push(DowntimeEvent {
                        start,
                        end: observation.timestamp,
                        ongoing: false,
                    });
                    run_start = None;
                }
                _ => {}
            }
        }

        if let Some(start) = run_start {
            events.push(DowntimeEvent {
                start,
                end: now,
                ongoing: true,
            });
        }
        events
    }
}

/// Owning store of uptime records, keyed by device identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeTracker {
    records: HashMap<String, UptimeRecord>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for UptimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an observation for a device, creating its record on first
    /// sight. Mutation happens in place.
    pub fn record(&mut self, device_id: &str, online: bool, response_time: Option<Duration>) {
        let capacity = self.capacity;
        self.records
            .entry(device_id.to_string())
            .or_insert_with(|| UptimeRecord::new(capacity))
            .push(Observation {
                timestamp: Utc::now(),
                was_online: online,
                response_time,
            });
    }

    /// Append with an explicit timestamp; scans record their own clock
    pub fn record_at(
        &mut self,
        device_id: &str,
        online: bool,
        response_time: Option<Duration>,
        timestamp: DateTime<Utc>,
    ) {
        let capacity = self.capacity;
        self.records
            .entry(device_id.to_string())
            .or_insert_with(|| UptimeRecord::new(capacity))
            .push(Observation {
                timestamp,
                was_online: online,
                response_time,
            });
    }

    pub fn get(&self, device_id: &str) -> Option<&UptimeRecord> {
        self.records.get(device_id)
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn remove(&mut self, device_id: &str) -> Option<UptimeRecord> {
        self.records.remove(device_id)
    }

    pub fn statistics(&self) -> UptimeStatistics {
        UptimeStatistics::from_tracker(self)
    }
}

/// Fleet-wide availability summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeStatistics {
    pub tracked_devices: usize,
    pub average_uptime: f64,
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
    pub unstable: usize,
}

impl UptimeStatistics {
    pub fn from_tracker(tracker: &UptimeTracker) -> Self {
        let mut stats = Self {
            tracked_devices: tracker.records.len(),
            average_uptime: 0.0,
            excellent: 0,
            good: 0,
            fair: 0,
            poor: 0,
            unstable: 0,
        };
        if tracker.records.is_empty() {
            return stats;
        }

        let mut total = 0.0;
        for record in tracker.records.values() {
            let pct = record.uptime_percentage();
            total += pct;
            match Reliability::from_percentage(pct) {
                Reliability::Excellent => stats.excellent += 1,
                Reliability::Good => stats.good += 1,
                Reliability::Fair => stats.fair += 1,
                Reliability::Poor => stats.poor += 1,
                Reliability::Unstable => stats.unstable += 1,
            }
        }
        stats.average_uptime = total / tracker.records.len() as f64;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_percentage_bounds() {
        let mut tracker = UptimeTracker::new();
        for i in 0..50 {
            tracker.record("d1", i % 3 != 0, None);
        }
        let pct = tracker.get("d1").unwrap().uptime_percentage();
        assert!((0.0..=100.0).contains(&pct));
    }

    #[test]
    fn test_hundred_percent_iff_all_online() {
        let mut tracker = UptimeTracker::new();
        for _ in 0..20 {
            tracker.record("steady", true, Some(Duration::from_millis(3)));
        }
        assert_eq!(tracker.get("steady").unwrap().uptime_percentage(), 100.0);

        tracker.record("steady", false, None);
        assert!(tracker.get("steady").unwrap().uptime_percentage() < 100.0);
    }

    #[test]
    fn test_ring_capacity_evicts_oldest() {
        let mut tracker = UptimeTracker::with_capacity(10);
        // 10 offline samples, then 10 online: the offline ones must age out
        for _ in 0..10 {
            tracker.record("d1", false, None);
        }
        for _ in 0..10 {
            tracker.record("d1", true, None);
        }

        let record = tracker.get("d1").unwrap();
        assert_eq!(record.observation_count(), 10);
        assert_eq!(record.uptime_percentage(), 100.0);
    }

    #[test]
    fn test_reliability_bands() {
        assert_eq!(Reliability::from_percentage(99.5), Reliability::Excellent);
        assert_eq!(Reliability::from_percentage(99.0), Reliability::Excellent);
        assert_eq!(Reliability::from_percentage(96.0), Reliability::Good);
        assert_eq!(Reliability::from_percentage(90.0), Reliability::Fair);
        assert_eq!(Reliability::from_percentage(75.0), Reliability::Poor);
        assert_eq!(Reliability::from_percentage(50.0), Reliability::Unstable);
    }

    #[test]
    fn test_downtime_events_coalesce_runs() {
        let base = Utc::now() - ChronoDuration::hours(1);
        let mut tracker = UptimeTracker::new();
        // online, offline x2, online, offline (trailing)
        let pattern = [true, false, false, true, false];
        for (i, online) in pattern.iter().enumerate() {
            tracker.record_at(
                "d1",
                *online,
                None,
                base + ChronoDuration::minutes(i as i64),
            );
        }

        let now = base + ChronoDuration::minutes(10);
        let events = tracker.get("d1").unwrap().downtime_events(now);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, base + ChronoDuration::minutes(1));
        assert_eq!(events[0].end, base + ChronoDuration::minutes(3));
        assert!(!events[0].ongoing);
        assert_eq!(events[1].start, base + ChronoDuration::minutes(4));
        assert_eq!(events[1].end, now);
        assert!(events[1].ongoing);
    }

    #[test]
    fn test_downtime_events_reconstruct_sequence() {
        // Every offline observation must fall inside exactly one event
        let base = Utc::now() - ChronoDuration::hours(1);
        let pattern = [false, true, false, false, true, true, false];
        let mut tracker = UptimeTracker::new();
        for (i, online) in pattern.iter().enumerate() {
            tracker.record_at("d1", *online, None, base + ChronoDuration::minutes(i as i64));
        }

        let now = base + ChronoDuration::minutes(20);
        let record = tracker.get("d1").unwrap();
        let events = record.downtime_events(now);

        for observation in record.observations().filter(|o| !o.was_online) {
            let covered = events
                .iter()
                .any(|e| e.start <= observation.timestamp && observation.timestamp < e.end);
            assert!(covered, "offline sample at {} uncovered", observation.timestamp);
        }
        let offline_runs = 3;
        assert_eq!(events.len(), offline_runs);
    }

    #[test]
    fn test_average_response_time() {
        let mut tracker = UptimeTracker::new();
        tracker.record("d1", true, Some(Duration::from_millis(10)));
        tracker.record("d1", true, Some(Duration::from_millis(30)));
        tracker.record("d1", false, None);

        let avg = tracker.get("d1").unwrap().average_response_time().unwrap();
        assert_eq!(avg, Duration::from_millis(20));
    }

    #[test]
    fn test_tracker_serde_roundtrip() {
        let mut tracker = UptimeTracker::with_capacity(100);
        tracker.record("AA:BB:CC:DD:EE:FF", true, Some(Duration::from_millis(5)));
        tracker.record("AA:BB:CC:DD:EE:FF", false, None);

        let json = serde_json::to_string(&tracker).unwrap();
        let back: UptimeTracker = serde_json::from_str(&json).unwrap();
        let record = back.get("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(record.observation_count(), 2);
        assert_eq!(record.uptime_percentage(), 50.0);
    }

    #[test]
    fn test_statistics() {
        let mut tracker = UptimeTracker::new();
        for _ in 0..20 {
            tracker.record("solid", true, None);
        }
        for i in 0..20 {
            tracker.record("flaky", i % 2 == 0, None);
        }

        let stats = tracker.statistics();
        assert_eq!(stats.tracked_devices, 2);
        assert_eq!(stats.excellent, 1);
        assert_eq!(stats.unstable, 1);
        assert_eq!(stats.average_uptime, 75.0);
    }
}
