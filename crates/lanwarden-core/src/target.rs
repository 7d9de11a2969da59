//! Scan target definitions - subnet prefixes, scan modes, and port sets

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Ports commonly used by backdoors and trojans. These ride along in every
/// working set: an open backdoor port is a direct security signal, not a
/// service-discovery target.
pub const BACKDOOR_PORTS: &[u16] = &[31337, 12345, 27374, 54320, 9999, 6667, 2222];

/// Ports whose exposure on a consumer network is itself a risk signal
pub const DANGEROUS_PORTS: &[u16] = &[23, 21, 69, 135, 139, 445, 1433, 3306, 5432, 6379, 27017];

/// A validated /24 subnet prefix such as "192.168.1"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    octets: [u8; 3],
}

impl Subnet {
    /// Parse a dotted prefix with exactly three octets. Rejected
    /// synchronously before any network activity begins.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().trim_end_matches('.');
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidSubnet(format!(
                "expected three octets, got {:?}",
                s
            )));
        }

        let mut octets = [0u8; 3];
        for (i, part) in parts.iter().enumerate() {
            octets[i] = part
                .parse::<u8>()
                .map_err(|_| Error::InvalidSubnet(format!("bad octet {:?} in {:?}", part, s)))?;
        }

        Ok(Self { octets })
    }

    /// Build the host address for a last octet
    pub fn host(&self, last_octet: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.octets[0], self.octets[1], self.octets[2], last_octet)
    }

    /// All usable host addresses, 1-254
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (1u8..=254).map(|o| self.host(o))
    }

    /// Whether an address belongs to this subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let o = ip.octets();
        o[0] == self.octets[0] && o[1] == self.octets[1] && o[2] == self.octets[2]
    }

    pub fn prefix(&self) -> String {
        format!("{}.{}.{}", self.octets[0], self.octets[1], self.octets[2])
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl TryFrom<String> for Subnet {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> {
        Subnet::parse(&s)
    }
}

impl From<Subnet> for String {
    fn from(s: Subnet) -> String {
        s.prefix()
    }
}

/// Scanning thoroughness. The working set size is the dominant cost driver,
/// so it is selectable rather than hardcoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// ~100 common service ports plus the backdoor list
    #[default]
    Quick,
    /// Well-known range 1-1024 plus high-value and backdoor ports
    Standard,
    /// Every port, 1-65535
    Comprehensive,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Quick => "quick",
            ScanMode::Standard => "standard",
            ScanMode::Comprehensive => "comprehensive",
        }
    }

    /// The port working set for this mode: deduplicated, ascending
    pub fn port_set(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = match self {
            ScanMode::Quick => COMMON_PORTS.to_vec(),
            ScanMode::Standard => {
                let mut v: Vec<u16> = (1..=1024).collect();
                v.extend_from_slice(HIGH_VALUE_PORTS);
                v
            }
            ScanMode::Comprehensive => return (1..=65535).collect(),
        };
        ports.extend_from_slice(BACKDOOR_PORTS);
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}

impl std::str::FromStr for ScanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(ScanMode::Quick),
            "standard" => Ok(ScanMode::Standard),
            "comprehensive" | "deep" | "full" => Ok(ScanMode::Comprehensive),
            other => Err(Error::InvalidConfig {
                key: String::from("scan_mode"),
                message: format!("unknown mode {:?}", other),
            }),
        }
    }
}

/// ~100 most common consumer-network TCP service ports
const COMMON_PORTS: &[u16] = &[
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 67, 68, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135,
    139, 143, 144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548, 554, 587,
    631, 646, 873, 990, 993, 995, 1025, 1026, 1027, 1110, 1433, 1720, 1723, 1755, 1883, 1900,
    2000, 2049, 2121, 3000, 3128, 3306, 3389, 4899, 5000, 5009, 5060, 5101, 5190, 5357, 5432,
    5631, 5666, 5800, 5900, 6000, 6001, 6646, 7070, 8000, 8008, 8009, 8080, 8081, 8443, 8883,
    8888, 9100, 10000, 32768, 49152, 49153, 49154, 49155, 49156,
];

/// High-value ports above 1024 worth probing in a standard scan
const HIGH_VALUE_PORTS: &[u16] = &[
    1433, 1883, 3000, 3306, 3389, 5000, 5432, 5900, 6379, 8000, 8080, 8443, 8883, 9100, 11211,
    27017,
];

/// Validate a port working set before a scan begins
pub fn validate_port_set(ports: &[u16]) -> Result<()> {
    if ports.is_empty() {
        return Err(Error::EmptyPortSet);
    }
    if let Some(&p) = ports.iter().find(|&&p| p == 0) {
        return Err(Error::InvalidConfig {
            key: String::from("ports"),
            message: format!("port {} out of range", p),
        });
    }
    Ok(())
}

/// Whether a port belongs to the backdoor/trojan list
pub fn is_backdoor_port(port: u16) -> bool {
    BACKDOOR_PORTS.contains(&port)
}

/// Whether a port belongs to the dangerous-exposure list
pub fn is_dangerous_port(port: u16) -> bool {
    DANGEROUS_PORTS.contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subnet() {
        let subnet = Subnet::parse("192.168.1").unwrap();
        assert_eq!(subnet.host(5), Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(subnet.prefix(), "192.168.1");
    }

    #[test]
    fn test_parse_subnet_trailing_dot() {
        let subnet = Subnet::parse("10.0.0.").unwrap();
        assert_eq!(subnet.prefix(), "10.0.0");
    }

    #[test]
    fn test_parse_subnet_rejects_malformed() {
        assert!(Subnet::parse("192.168").is_err());
        assert!(Subnet::parse("192.168.1.0").is_err());
        assert!(Subnet::parse("192.168.abc").is_err());
        assert!(Subnet::parse("192.168.300").is_err());
        assert!(Subnet::parse("").is_err());
    }

    #[test]
    fn test_subnet_hosts_range() {
        let subnet = Subnet::parse("10.0.0").unwrap();
        let hosts: Vec<Ipv4Addr> = subnet.hosts().collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(10, 0, 0, 254));
    }

    #[test]
    fn test_subnet_contains() {
        let subnet = Subnet::parse("192.168.1").unwrap();
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 1, 77)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 2, 77)));
    }

    #[test]
    fn test_port_sets_include_backdoor_ports() {
        for mode in [ScanMode::Quick, ScanMode::Standard] {
            let set = mode.port_set();
            for &bd in BACKDOOR_PORTS {
                assert!(set.contains(&bd), "{:?} missing backdoor port {}", mode, bd);
            }
        }
    }

    #[test]
    fn test_port_sets_sorted_and_deduped() {
        for mode in [ScanMode::Quick, ScanMode::Standard] {
            let set = mode.port_set();
            let mut sorted = set.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(set, sorted);
        }
    }

    #[test]
    fn test_comprehensive_covers_all_ports() {
        let set = ScanMode::Comprehensive.port_set();
        assert_eq!(set.len(), 65535);
        assert_eq!(set[0], 1);
        assert_eq!(set[65534], 65535);
    }

    #[test]
    fn test_validate_port_set() {
        assert!(validate_port_set(&[]).is_err());
        assert!(validate_port_set(&[0]).is_err());
        assert!(validate_port_set(&[22, 80]).is_ok());
    }

    #[test]
    fn test_scan_mode_from_str() {
        assert_eq!("quick".parse::<ScanMode>().unwrap(), ScanMode::Quick);
        assert_eq!("deep".parse::<ScanMode>().unwrap(), ScanMode::Comprehensive);
        assert!("turbo".parse::<ScanMode>().is_err());
    }
}
