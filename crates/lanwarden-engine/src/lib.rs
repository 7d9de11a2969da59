//! LanWarden Engine - scan orchestration
//!
//! The orchestrator drives one scan end to end: discovery, per-host port
//! scanning, classification, reputation scoring. It owns the inventory while
//! a scan runs and emits progress over an event channel. The scheduler turns
//! `ScanSchedule`s into due-scan decisions on a tick.

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{
    ScanEvent, ScanHandle, ScanOrchestrator, ScanOutcome, ScanReport, ScanState,
};
pub use scheduler::ScanScheduler;
