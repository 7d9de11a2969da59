//! LanWarden Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions used throughout LanWarden:
//! - `Device` / `PortInfo` / `DeviceInventory`: the scan result model
//! - `Subnet` / `ScanMode`: what to scan and how thoroughly
//! - `ScanSchedule`: recurring scan configuration
//! - `Error` / `Result`: shared error taxonomy
//!
//! No network I/O happens here; everything is plain data plus validation.

pub mod device;
pub mod error;
pub mod schedule;
pub mod target;

// Re-export commonly used types at crate root
pub use device::{Device, DeviceInventory, DeviceType, PortInfo, PortState, Protocol};
pub use error::{Error, Result};
pub use schedule::ScanSchedule;
pub use target::{ScanMode, Subnet};
