//! LanWarden Analysis - derived views over scan results
//!
//! Everything in this crate is a pure or store-owned computation over the
//! `lanwarden-core` data model:
//! - `ReputationScorer`: trust score with a retained factor breakdown
//! - `ThreatAnalyzer`: severity-ranked findings over an inventory
//! - `UptimeTracker`: availability history and downtime reconstruction
//! - `compliance`: named pass/fail checks over the device list

pub mod compliance;
pub mod reputation;
pub mod threat;
pub mod uptime;

pub use compliance::{ComplianceCheck, ComplianceReport};
pub use reputation::{
    DeviceReputation, ReputationFactor, ReputationRating, ReputationScorer,
    ReputationStatistics,
};
pub use threat::{Severity, ThreatAnalyzer, ThreatFinding, ThreatSummary};
pub use uptime::{
    DowntimeEvent, Observation, Reliability, UptimeRecord, UptimeStatistics, UptimeTracker,
};
