//! Threat analysis - severity-ranked findings over a completed inventory
//!
//! Stateless: every run re-derives findings from the device list alone, so
//! the same inventory always yields the same report.

use lanwarden_core::target::is_backdoor_port;
use lanwarden_core::{Device, DeviceInventory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

const DATABASE_PORTS: &[u16] = &[1433, 3306, 5432, 6379, 27017];
const SMB_PORTS: &[u16] = &[135, 137, 138, 139, 445];

/// Finding severity, ordered most severe first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One security finding against one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatFinding {
    pub device_id: String,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    /// Ports implicated by the finding, when port-based
    pub ports: Vec<u16>,
}

impl ThreatFinding {
    fn new(
        device: &Device,
        severity: Severity,
        title: &str,
        detail: String,
        ports: Vec<u16>,
    ) -> Self {
        Self {
            device_id: device.identity(),
            severity,
            title: title.to_string(),
            detail,
            ports,
        }
    }
}

/// Inventory-wide findings plus severity counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatSummary {
    pub findings: Vec<ThreatFinding>,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl ThreatSummary {
    pub fn total(&self) -> usize {
        self.findings.len()
    }

    /// Findings grouped by device identity
    pub fn by_device(&self) -> HashMap<&str, Vec<&ThreatFinding>> {
        let mut map: HashMap<&str, Vec<&ThreatFinding>> = HashMap::new();
        for finding in &self.findings {
            map.entry(finding.device_id.as_str()).or_default().push(finding);
        }
        map
    }
}

/// Stateless threat analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreatAnalyzer;

impl ThreatAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a full inventory. Findings come out sorted by severity, then
    /// device, so reports are stable.
    pub fn analyze(&self, inventory: &DeviceInventory) -> ThreatSummary {
        let mut findings = Vec::new();
        for device in inventory.iter() {
            self.analyze_device(device, &mut findings);
        }
        findings.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        let count = |severity: Severity| {
            findings.iter().filter(|f| f.severity == severity).count()
        };
        let summary = ThreatSummary {
            critical: count(Severity::Critical),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            info: count(Severity::Info),
            findings,
        };
        info!(
            "Threat analysis: {} findings ({} critical, {} high)",
            summary.total(),
            summary.critical,
            summary.high
        );
        summary
    }

    fn analyze_device(&self, device: &Device, findings: &mut Vec<ThreatFinding>) {
        let open = device.open_port_numbers();

        let backdoor: Vec<u16> = open.iter().copied().filter(|&p| is_backdoor_port(p)).collect();
        if !backdoor.is_empty() {
            findings.push(ThreatFinding::new(
                device,
                Severity::Critical,
                "Backdoor port open",
                format!(
                    "Port(s) {:?} are associated with known backdoors and remote access trojans",
                    backdoor
                ),
                backdoor,
            ));
        }

        if device.has_open_port(23) {
            findings.push(ThreatFinding::new(
                device,
                Severity::High,
                "Telnet exposed",
                String::from("Telnet transmits credentials in cleartext"),
                vec![23],
            ));
        }
        if device.has_open_port(21) {
            findings.push(ThreatFinding::new(
                device,
                Severity::High,
                "FTP exposed",
                String::from("FTP transmits credentials in cleartext"),
                vec![21],
            ));
        }

        let databases: Vec<u16> = open
            .iter()
            .copied()
            .filter(|p| DATABASE_PORTS.contains(p))
            .collect();
        if !databases.is_empty() {
            findings.push(ThreatFinding::new(
                device,
                Severity::High,
                "Database port exposed",
                format!("Database service(s) reachable on port(s) {:?}", databases),
                databases,
            ));
        }

        let smb: Vec<u16> = open.iter().copied().filter(|p| SMB_PORTS.contains(p)).collect();
        if !smb.is_empty() {
            findings.push(ThreatFinding::new(
                device,
                Severity::Medium,
                "SMB/NetBIOS exposed",
                format!("Windows file sharing reachable on port(s) {:?}", smb),
                smb,
            ));
        }

        if device.is_rogue {
            findings.push(ThreatFinding::new(
                device,
                Severity::High,
                "Rogue device",
                String::from("Recently appeared on the network and not on the allowlist"),
                Vec::new(),
            ));
        }

        if open.len() >= 15 {
            findings.push(ThreatFinding::new(
                device,
                Severity::Medium,
                "Excessive attack surface",
                format!("{} open ports", open.len()),
                Vec::new(),
            ));
        }

        // Web management offered only over plaintext HTTP
        let has_http = open.contains(&80) || open.contains(&8080);
        let has_https = open.contains(&443) || open.contains(&8443);
        if has_http && !has_https {
            findings.push(ThreatFinding::new(
                device,
                Severity::Low,
                "Unencrypted management interface",
                String::from("HTTP available without an HTTPS alternative"),
                open.iter().copied().filter(|p| *p == 80 || *p == 8080).collect(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwarden_core::PortInfo;
    use std::net::Ipv4Addr;

    fn device(last_octet: u8, ports: &[u16]) -> Device {
        let mut d = Device::new(Ipv4Addr::new(192, 168, 1, last_octet));
        for &port in ports {
            d.add_port(PortInfo::open(port));
        }
        d
    }

    fn inventory(devices: Vec<Device>) -> DeviceInventory {
        devices.into_iter().collect()
    }

    #[test]
    fn test_backdoor_is_critical() {
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![device(5, &[80, 31337])]));
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.findings[0].severity, Severity::Critical);
        assert_eq!(summary.findings[0].ports, vec![31337]);
    }

    #[test]
    fn test_cleartext_and_database_findings() {
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![device(6, &[21, 23, 3306])]));

        let titles: Vec<&str> = summary.findings.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Telnet exposed"));
        assert!(titles.contains(&"FTP exposed"));
        assert!(titles.contains(&"Database port exposed"));
        assert_eq!(summary.high, 3);
    }

    #[test]
    fn test_rogue_device_flagged() {
        let mut rogue = device(7, &[]);
        rogue.is_rogue = true;
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![rogue]));

        assert_eq!(summary.high, 1);
        assert_eq!(summary.findings[0].title, "Rogue device");
    }

    #[test]
    fn test_plaintext_http_only_is_low() {
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![device(8, &[80])]));
        assert_eq!(summary.low, 1);

        // HTTPS alongside clears the finding
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![device(8, &[80, 443])]));
        assert_eq!(summary.low, 0);
    }

    #[test]
    fn test_findings_sorted_by_severity() {
        let ports: Vec<u16> = (8000..8016).collect(); // 16 ports, surface finding
        let mut many = device(9, &ports);
        many.add_port(PortInfo::open(31337));
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![many, device(10, &[23])]));

        let severities: Vec<Severity> = summary.findings.iter().map(|f| f.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
        assert_eq!(summary.critical, 1);
    }

    #[test]
    fn test_clean_inventory_has_no_findings() {
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![device(11, &[22, 443])]));
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_by_device_grouping() {
        let summary = ThreatAnalyzer::new().analyze(&inventory(vec![
            device(12, &[23, 3306]),
            device(13, &[21]),
        ]));
        let grouped = summary.by_device();
        assert_eq!(grouped["192.168.1.12"].len(), 2);
        assert_eq!(grouped["192.168.1.13"].len(), 1);
    }
}
