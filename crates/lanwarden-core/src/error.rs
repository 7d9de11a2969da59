//! Error types for LanWarden
//!
//! Connectivity outcomes (host unreachable, port closed, probe timeout) are
//! never represented here - they fold into the result model as "not open" /
//! "not online" values. This enum covers configuration and orchestration
//! failures only.

use thiserror::Error;

/// Result type alias using the LanWarden Error
pub type Result<T> = std::result::Result<T, Error>;

/// LanWarden error types
#[derive(Error, Debug)]
pub enum Error {
    // === Input validation ===
    #[error("Invalid subnet prefix: {0}")]
    InvalidSubnet(String),

    #[error("Empty port set for scan mode")]
    EmptyPortSet,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    // === Configuration ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === Orchestration ===
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Scan already running")]
    ScanInProgress,

    #[error("Progress channel closed before scan finished")]
    ChannelClosed,

    // === Persistence ===
    #[error("Store error: {0}")]
    Store(String),

    // === IO / serialization ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error should abort the whole scan run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidSubnet(_)
                | Error::EmptyPortSet
                | Error::Configuration(_)
                | Error::InvalidConfig { .. }
                | Error::ScanFailed(_)
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidSubnet(_) => "INVALID_SUBNET",
            Error::EmptyPortSet => "EMPTY_PORT_SET",
            Error::InvalidSchedule(_) => "INVALID_SCHEDULE",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::ScanFailed(_) => "SCAN_FAILED",
            Error::ScanInProgress => "SCAN_IN_PROGRESS",
            Error::ChannelClosed => "CHANNEL_CLOSED",
            Error::Store(_) => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
