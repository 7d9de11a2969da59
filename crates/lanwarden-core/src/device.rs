//! Device model - the aggregate produced by a scan run
//!
//! A `Device` is identified by its IP address within a scan session; the MAC
//! address (when ARP yielded one) carries identity across sessions. The
//! orchestrator is the sole writer of a `DeviceInventory` while a scan runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// State of a scanned port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Port accepted a TCP connection
    Open,
    /// Connection was actively refused (RST)
    Closed,
    /// No terminal connection state before the timeout
    Filtered,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
        }
    }
}

/// Transport protocol of a scanned port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// A single port observation on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port number (1-65535)
    pub port: u16,
    /// Canonical service name, "Unknown" if unclassified
    pub service: String,
    /// Product version extracted from the banner, if any
    pub version: Option<String>,
    /// Port state
    pub state: PortState,
    /// Transport protocol
    pub protocol: Protocol,
    /// Raw grabbed banner, if any
    pub banner: Option<String>,
}

impl PortInfo {
    pub fn open(port: u16) -> Self {
        Self {
            port,
            service: String::from("Unknown"),
            version: None,
            state: PortState::Open,
            protocol: Protocol::Tcp,
            banner: None,
        }
    }

    pub fn closed(port: u16) -> Self {
        Self {
            port,
            service: String::from("Unknown"),
            version: None,
            state: PortState::Closed,
            protocol: Protocol::Tcp,
            banner: None,
        }
    }

    pub fn filtered(port: u16) -> Self {
        Self {
            port,
            service: String::from("Unknown"),
            version: None,
            state: PortState::Filtered,
            protocol: Protocol::Tcp,
            banner: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Device-type taxonomy derived from the open-port signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Router,
    Server,
    Computer,
    Mobile,
    Iot,
    Printer,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "router",
            DeviceType::Server => "server",
            DeviceType::Computer => "computer",
            DeviceType::Mobile => "mobile",
            DeviceType::Iot => "iot",
            DeviceType::Printer => "printer",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discovered network device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// IPv4 address - scan-session identity
    pub ip_address: Ipv4Addr,
    /// MAC address, when ARP resolution succeeded
    pub mac_address: Option<String>,
    /// Resolved or assigned hostname
    pub hostname: Option<String>,
    /// Manufacturer derived from the MAC OUI
    pub manufacturer: Option<String>,
    /// Classified device type
    pub device_type: DeviceType,
    /// Open ports, ascending numeric order, no duplicates
    pub open_ports: Vec<PortInfo>,
    /// Whether the device responded during this scan
    pub is_online: bool,
    /// First time this device was ever observed
    pub first_seen: DateTime<Utc>,
    /// Most recent observation
    pub last_seen: DateTime<Utc>,
    /// Allowlist membership
    pub is_known_device: bool,
    /// Newly observed within the rogue window and not allowlisted
    pub is_rogue: bool,
    /// OS guess from banner heuristics
    pub operating_system: Option<String>,
}

impl Device {
    /// Create a device observed right now
    pub fn new(ip_address: Ipv4Addr) -> Self {
        let now = Utc::now();
        Self {
            ip_address,
            mac_address: None,
            hostname: None,
            manufacturer: None,
            device_type: DeviceType::Unknown,
            open_ports: Vec::new(),
            is_online: true,
            first_seen: now,
            last_seen: now,
            is_known_device: false,
            is_rogue: false,
            operating_system: None,
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(normalize_mac(&mac.into()));
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Stable identity key: MAC when available, otherwise the IP
    pub fn identity(&self) -> String {
        self.mac_address
            .clone()
            .unwrap_or_else(|| self.ip_address.to_string())
    }

    /// Insert a port observation, keeping ascending order and rejecting
    /// duplicates. Returns false when the port was already present.
    pub fn add_port(&mut self, info: PortInfo) -> bool {
        match self.open_ports.binary_search_by_key(&info.port, |p| p.port) {
            Ok(_) => false,
            Err(idx) => {
                self.open_ports.insert(idx, info);
                true
            }
        }
    }

    /// Numbers of all open ports, ascending
    pub fn open_port_numbers(&self) -> Vec<u16> {
        self.open_ports
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.port)
            .collect()
    }

    pub fn has_open_port(&self, port: u16) -> bool {
        self.open_ports.iter().any(|p| p.port == port && p.is_open())
    }

    /// Record a sighting, preserving the first_seen <= last_seen invariant
    pub fn touch(&mut self, seen_at: DateTime<Utc>) {
        if seen_at < self.first_seen {
            self.first_seen = seen_at;
        }
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
    }

    /// Carry cross-session identity fields over from a previous sighting of
    /// the same device (matched by MAC or IP by the caller).
    pub fn inherit_history(&mut self, previous: &Device) {
        if previous.first_seen < self.first_seen {
            self.first_seen = previous.first_seen;
        }
        if self.hostname.is_none() {
            self.hostname = previous.hostname.clone();
        }
        if self.mac_address.is_none() {
            self.mac_address = previous.mac_address.clone();
        }
    }
}

/// Normalize a MAC address to uppercase colon-separated form
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().replace('-', ":").to_uppercase()
}

/// Ordered list of devices from one scan session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInventory {
    devices: Vec<Device>,
}

impl DeviceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a device. An existing entry with the same IP is
    /// replaced, inheriting its history; otherwise the device is appended.
    pub fn upsert(&mut self, mut device: Device) {
        if let Some(existing) = self
            .devices
            .iter_mut()
            .find(|d| d.ip_address == device.ip_address)
        {
            device.inherit_history(existing);
            *existing = device;
        } else {
            self.devices.push(device);
        }
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&Device> {
        self.devices.iter().find(|d| d.ip_address == ip)
    }

    pub fn find_by_mac(&self, mac: &str) -> Option<&Device> {
        let mac = normalize_mac(mac);
        self.devices
            .iter()
            .find(|d| d.mac_address.as_deref() == Some(mac.as_str()))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Device] {
        &mut self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_online).count()
    }

    /// Sort by the numeric value of the IP, lowest last octet first within
    /// the subnet. Keeps downstream reports stable.
    pub fn sort_by_ip(&mut self) {
        self.devices.sort_by_key(|d| u32::from(d.ip_address));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }
}

impl IntoIterator for DeviceInventory {
    type Item = Device;
    type IntoIter = std::vec::IntoIter<Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}

impl FromIterator<Device> for DeviceInventory {
    fn from_iter<T: IntoIterator<Item = Device>>(iter: T) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}
