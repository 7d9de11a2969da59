//! Configuration management for LanWarden components

use lanwarden_core::{Error, Result, ScanMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Port scanner settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Host discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Reputation and rogue-detection settings
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// Uptime tracking settings
    #[serde(default)]
    pub uptime: UptimeConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (LANWARDEN_ prefix)
    pub fn merge_env(mut self) -> Self {
        if let Ok(val) = std::env::var("LANWARDEN_SCAN_MODE") {
            if let Ok(mode) = val.parse() {
                self.scanner.mode = mode;
            }
        }
        if let Ok(val) = std::env::var("LANWARDEN_PORT_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.scanner.port_concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("LANWARDEN_HOST_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.scanner.host_concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("LANWARDEN_ROGUE_WINDOW_MINUTES") {
            if let Ok(n) = val.parse() {
                self.reputation.rogue_window_minutes = n;
            }
        }
        if let Ok(val) = std::env::var("LANWARDEN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("LANWARDEN_LOG_FORMAT") {
            self.logging.format = val;
        }
        self
    }

    /// Reject structurally invalid values before any scan starts
    pub fn validate(&self) -> Result<()> {
        if self.scanner.port_concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("scanner.port_concurrency"),
                message: String::from("must be greater than zero"),
            });
        }
        if self.scanner.host_concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("scanner.host_concurrency"),
                message: String::from("must be greater than zero"),
            });
        }
        if self.discovery.concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("discovery.concurrency"),
                message: String::from("must be greater than zero"),
            });
        }
        if self.uptime.capacity == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("uptime.capacity"),
                message: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }
}

/// Port scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Scan thoroughness (port working set)
    #[serde(default)]
    pub mode: ScanMode,

    /// Timeout per port probe, milliseconds
    #[serde(default = "default_port_timeout")]
    pub port_timeout_ms: u64,

    /// Maximum concurrent port probes per host
    #[serde(default = "default_port_concurrency")]
    pub port_concurrency: usize,

    /// Maximum hosts scanned concurrently
    #[serde(default = "default_host_concurrency")]
    pub host_concurrency: usize,

    /// Grab banners from open ports
    #[serde(default = "default_true")]
    pub grab_banners: bool,

    /// Banner read timeout, milliseconds
    #[serde(default = "default_banner_timeout")]
    pub banner_timeout_ms: u64,
}

fn default_port_timeout() -> u64 {
    1500
}

fn default_port_concurrency() -> usize {
    100
}

fn default_host_concurrency() -> usize {
    16
}

fn default_banner_timeout() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Quick,
            port_timeout_ms: default_port_timeout(),
            port_concurrency: default_port_concurrency(),
            host_concurrency: default_host_concurrency(),
            grab_banners: true,
            banner_timeout_ms: default_banner_timeout(),
        }
    }
}

/// Host discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Last octets of previously-seen devices to probe first
    #[serde(default)]
    pub known_octets: Vec<u8>,

    /// Likely-occupied last-octet ranges, probed before the full sweep
    #[serde(default = "default_common_ranges")]
    pub common_ranges: Vec<(u8, u8)>,

    /// Timeout for the known-device phase, milliseconds
    #[serde(default = "default_known_timeout")]
    pub known_timeout_ms: u64,

    /// Timeout for the common-range phase, milliseconds
    #[serde(default = "default_common_timeout")]
    pub common_timeout_ms: u64,

    /// Timeout for the full-sweep phase, milliseconds
    #[serde(default = "default_sweep_timeout")]
    pub sweep_timeout_ms: u64,

    /// Maximum concurrent liveness probes
    #[serde(default = "default_discovery_concurrency")]
    pub concurrency: usize,

    /// Ports probed by the TCP-connect liveness check
    #[serde(default = "default_liveness_ports")]
    pub liveness_ports: Vec<u16>,
}

fn default_common_ranges() -> Vec<(u8, u8)> {
    vec![(1, 10), (20, 100), (100, 200), (200, 254)]
}

fn default_known_timeout() -> u64 {
    300
}

fn default_common_timeout() -> u64 {
    400
}

fn default_sweep_timeout() -> u64 {
    500
}

fn default_discovery_concurrency() -> usize {
    64
}

fn default_liveness_ports() -> Vec<u16> {
    vec![80, 443, 22, 445, 8080, 62078]
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            known_octets: Vec::new(),
            common_ranges: default_common_ranges(),
            known_timeout_ms: default_known_timeout(),
            common_timeout_ms: default_common_timeout(),
            sweep_timeout_ms: default_sweep_timeout(),
            concurrency: default_discovery_concurrency(),
            liveness_ports: default_liveness_ports(),
        }
    }
}

/// Reputation scoring and rogue-detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// A device first observed within this window that is not allowlisted
    /// is flagged rogue
    #[serde(default = "default_rogue_window")]
    pub rogue_window_minutes: u64,
}

fn default_rogue_window() -> u64 {
    15
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            rogue_window_minutes: default_rogue_window(),
        }
    }
}

/// Uptime tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeConfig {
    /// Ring-buffer capacity per device
    #[serde(default = "default_uptime_capacity")]
    pub capacity: usize,
}

fn default_uptime_capacity() -> usize {
    1000
}

impl Default for UptimeConfig {
    fn default() -> Self {
        Self {
            capacity: default_uptime_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn scan_mode(mut self, mode: ScanMode) -> Self {
        self.config.scanner.mode = mode;
        self
    }

    pub fn port_timeout_ms(mut self, ms: u64) -> Self {
        self.config.scanner.port_timeout_ms = ms;
        self
    }

    pub fn port_concurrency(mut self, n: usize) -> Self {
        self.config.scanner.port_concurrency = n;
        self
    }

    pub fn host_concurrency(mut self, n: usize) -> Self {
        self.config.scanner.host_concurrency = n;
        self
    }

    pub fn grab_banners(mut self, enabled: bool) -> Self {
        self.config.scanner.grab_banners = enabled;
        self
    }

    pub fn rogue_window_minutes(mut self, minutes: u64) -> Self {
        self.config.reputation.rogue_window_minutes = minutes;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
