//! Compliance checks - named pass/fail rules over the device list

use lanwarden_core::target::is_backdoor_port;
use lanwarden_core::{Device, DeviceInventory};
use serde::{Deserialize, Serialize};

const DATABASE_PORTS: &[u16] = &[1433, 3306, 5432, 6379, 27017];

/// One named rule with the devices that violated it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub name: String,
    pub passed: bool,
    /// Identities of devices failing the rule
    pub failing_devices: Vec<String>,
}

impl ComplianceCheck {
    fn evaluate<F>(name: &str, inventory: &DeviceInventory, violates: F) -> Self
    where
        F: Fn(&Device) -> bool,
    {
        let failing_devices: Vec<String> = inventory
            .iter()
            .filter(|d| violates(d))
            .map(|d| d.identity())
            .collect();
        Self {
            name: name.to_string(),
            passed: failing_devices.is_empty(),
            failing_devices,
        }
    }
}

/// Results of a full framework run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub framework: String,
    pub checks: Vec<ComplianceCheck>,
    pub passed: usize,
    pub failed: usize,
}

impl ComplianceReport {
    /// Run the baseline home-network hardening checks
    pub fn baseline(inventory: &DeviceInventory) -> Self {
        let checks = vec![
            ComplianceCheck::evaluate("No telnet services", inventory, |d| d.has_open_port(23)),
            ComplianceCheck::evaluate("No backdoor ports", inventory, |d| {
                d.open_port_numbers().iter().any(|&p| is_backdoor_port(p))
            }),
            ComplianceCheck::evaluate("No exposed databases", inventory, |d| {
                d.open_port_numbers().iter().any(|p| DATABASE_PORTS.contains(p))
            }),
            ComplianceCheck::evaluate("All devices known", inventory, |d| !d.is_known_device),
            ComplianceCheck::evaluate("Encrypted management only", inventory, |d| {
                let open = d.open_port_numbers();
                let http = open.contains(&80) || open.contains(&8080);
                let https = open.contains(&443) || open.contains(&8443);
                http && !https
            }),
        ];

        let passed = checks.iter().filter(|c| c.passed).count();
        let failed = checks.len() - passed;
        Self {
            framework: String::from("baseline"),
            checks,
            passed,
            failed,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwarden_core::PortInfo;
    use std::net::Ipv4Addr;

    fn known_device(last_octet: u8, ports: &[u16]) -> Device {
        let mut d = Device::new(Ipv4Addr::new(10, 0, 0, last_octet));
        d.is_known_device = true;
        for &port in ports {
            d.add_port(PortInfo::open(port));
        }
        d
    }

    #[test]
    fn test_clean_inventory_is_compliant() {
        let inventory: DeviceInventory =
            vec![known_device(1, &[22, 443]), known_device(2, &[443])]
                .into_iter()
                .collect();
        let report = ComplianceReport::baseline(&inventory);

        assert!(report.is_compliant());
        assert_eq!(report.passed, report.checks.len());
    }

    #[test]
    fn test_violations_name_the_device() {
        let mut unknown = Device::new(Ipv4Addr::new(10, 0, 0, 66));
        unknown.add_port(PortInfo::open(23));
        unknown.add_port(PortInfo::open(3306));
        let inventory: DeviceInventory = vec![known_device(1, &[443]), unknown]
            .into_iter()
            .collect();

        let report = ComplianceReport::baseline(&inventory);
        assert!(!report.is_compliant());

        let telnet = report
            .checks
            .iter()
            .find(|c| c.name == "No telnet services")
            .unwrap();
        assert!(!telnet.passed);
        assert_eq!(telnet.failing_devices, vec!["10.0.0.66"]);

        let known = report.checks.iter().find(|c| c.name == "All devices known").unwrap();
        assert_eq!(known.failing_devices, vec!["10.0.0.66"]);
    }

    #[test]
    fn test_plaintext_management_check() {
        let inventory: DeviceInventory = vec![known_device(3, &[80])].into_iter().collect();
        let report = ComplianceReport::baseline(&inventory);
        let check = report
            .checks
            .iter()
            .find(|c| c.name == "Encrypted management only")
            .unwrap();
        assert!(!check.passed);
    }
}
