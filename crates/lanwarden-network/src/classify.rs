//! Service and device classification
//!
//! Banner regexes extract product and version; a port-number map supplies the
//! canonical service name when no banner matched. Device-type classification
//! is a pure function of the open-port set: a fixed rule table evaluated in
//! priority order, deliberately simple and explainable rather than
//! statistical. MAC OUI prefixes map to manufacturers.

use lanwarden_core::DeviceType;
use regex::Regex;
use std::net::Ipv4Addr;
use tracing::debug;

/// Information extracted about one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Canonical service name ("ssh", "http", ...); "Unknown" if nothing hit
    pub service: String,
    /// Product name from the banner (e.g. "OpenSSH", "nginx")
    pub product: Option<String>,
    /// Version string from the banner
    pub version: Option<String>,
}

impl ServiceInfo {
    fn unknown() -> Self {
        Self {
            service: String::from("Unknown"),
            product: None,
            version: None,
        }
    }
}

struct BannerPattern {
    regex: Regex,
    service: &'static str,
    /// Fixed product name; falls back to a capture group when None
    product: Option<&'static str>,
    product_group: Option<usize>,
    version_group: Option<usize>,
}

/// Banner- and port-based service classifier
pub struct ServiceClassifier {
    patterns: Vec<BannerPattern>,
}

impl Default for ServiceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceClassifier {
    pub fn new() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }

    /// Classify a service from its banner, falling back to the port map.
    /// Unparseable banners degrade to a generic label, never an error.
    pub fn classify(&self, banner: Option<&str>, port: u16) -> ServiceInfo {
        if let Some(banner) = banner {
            for pattern in &self.patterns {
                if let Some(caps) = pattern.regex.captures(banner) {
                    let product = pattern
                        .product
                        .map(String::from)
                        .or_else(|| {
                            pattern
                                .product_group
                                .and_then(|g| caps.get(g))
                                .map(|m| m.as_str().trim().to_string())
                        });
                    let version = pattern
                        .version_group
                        .and_then(|g| caps.get(g))
                        .map(|m| m.as_str().to_string());

                    debug!(
                        "Banner on port {} matched {} ({:?} {:?})",
                        port, pattern.service, product, version
                    );
                    return ServiceInfo {
                        service: pattern.service.to_string(),
                        product,
                        version,
                    };
                }
            }
        }

        match service_name_for_port(port) {
            Some(name) => ServiceInfo {
                service: name.to_string(),
                product: None,
                version: None,
            },
            None => ServiceInfo::unknown(),
        }
    }

    /// Guess the operating system from a set of banners. Pure heuristic.
    pub fn os_hint(&self, banners: &[&str]) -> Option<String> {
        for banner in banners {
            let lower = banner.to_lowercase();
            for (needle, os) in OS_HINTS {
                if lower.contains(needle) {
                    return Some((*os).to_string());
                }
            }
        }
        None
    }
}

const OS_HINTS: &[(&str, &str)] = &[
    ("ubuntu", "Ubuntu Linux"),
    ("debian", "Debian Linux"),
    ("centos", "CentOS Linux"),
    ("fedora", "Fedora Linux"),
    ("raspbian", "Raspberry Pi OS"),
    ("windows", "Windows"),
    ("microsoft-iis", "Windows"),
    ("freebsd", "FreeBSD"),
    ("openbsd", "OpenBSD"),
    ("darwin", "macOS"),
    ("synology", "Synology DSM"),
    ("routeros", "MikroTik RouterOS"),
    ("openwrt", "OpenWrt"),
];

fn default_patterns() -> Vec<BannerPattern> {
    let mut patterns = Vec::new();
    let mut push = |regex: &str,
                    service: &'static str,
                    product: Option<&'static str>,
                    product_group: Option<usize>,
                    version_group: Option<usize>| {
        if let Ok(re) = Regex::new(regex) {
            patterns.push(BannerPattern {
                regex: re,
                service,
                product,
                product_group,
                version_group,
            });
        }
    };

    // OpenSSH before generic SSH
    push(
        r"SSH-[\d.]+-OpenSSH[_-](\d+\.\d+(?:\.\d+)?[p\d]*)",
        "ssh",
        Some("OpenSSH"),
        None,
        Some(1),
    );
    push(
        r"SSH-[\d.]+-(\S+?)(?:[_-](\d+[\d.]*\S*))?\s",
        "ssh",
        None,
        Some(1),
        Some(2),
    );
    // Specific HTTP servers before the generic Server header
    push(r"nginx/(\d+\.\d+(?:\.\d+)?)", "http", Some("nginx"), None, Some(1));
    push(
        r"Apache/(\d+\.\d+(?:\.\d+)?)",
        "http",
        Some("Apache"),
        None,
        Some(1),
    );
    push(
        r"Microsoft-IIS/(\d+\.\d+)",
        "http",
        Some("Microsoft-IIS"),
        None,
        Some(1),
    );
    push(
        r"Server:\s*([^\r\n/]+?)(?:/(\d+[\d.]*\S*))?\r?\n",
        "http",
        None,
        Some(1),
        Some(2),
    );
    // FTP daemons
    push(
        r"220[- ].*?(vsftpd|ProFTPD|Pure-FTPd|FileZilla)[ _]?(\d+[\d.]*)?",
        "ftp",
        None,
        Some(1),
        Some(2),
    );
    // SMTP daemons
    push(
        r"220[- ].*?\b(Postfix|Sendmail|Exim|Exchange)\b ?(\d+[\d.]*)?",
        "smtp",
        None,
        Some(1),
        Some(2),
    );
    // MariaDB before MySQL (a MariaDB greeting contains both markers)
    push(
        r"(\d+\.\d+\.\d+)-MariaDB",
        "mysql",
        Some("MariaDB"),
        None,
        Some(1),
    );
    push(
        r"(\d+\.\d+\.\d+(?:-\S+)?).*?MySQL|MySQL.*?(\d+\.\d+\.\d+)",
        "mysql",
        Some("MySQL"),
        None,
        Some(1),
    );
    push(
        r"PostgreSQL\s*(\d+(?:\.\d+)*)",
        "postgresql",
        Some("PostgreSQL"),
        None,
        Some(1),
    );
    push(
        r"redis_version:(\d+\.\d+\.\d+)",
        "redis",
        Some("Redis"),
        None,
        Some(1),
    );

    patterns
}

/// Canonical service name for a well-known port
pub fn service_name_for_port(port: u16) -> Option<&'static str> {
    let name = match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        67 | 68 => "dhcp",
        69 => "tftp",
        80 => "http",
        88 => "kerberos",
        110 => "pop3",
        111 => "rpcbind",
        123 => "ntp",
        135 => "msrpc",
        137 | 138 | 139 => "netbios",
        143 => "imap",
        161 | 162 => "snmp",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        515 => "printer",
        548 => "afp",
        554 => "rtsp",
        587 => "submission",
        631 => "ipp",
        993 => "imaps",
        995 => "pop3s",
        1433 => "mssql",
        1883 => "mqtt",
        2049 => "nfs",
        3000 => "http-alt",
        3306 => "mysql",
        3389 => "rdp",
        5000 => "upnp",
        5060 => "sip",
        5432 => "postgresql",
        5900..=5999 => "vnc",
        6379 => "redis",
        8000 | 8080 | 8443 | 8888 => "http-alt",
        8883 => "mqtts",
        9100 => "jetdirect",
        11211 => "memcached",
        27017 => "mongodb",
        62078 => "iphone-sync",
        _ => return None,
    };
    Some(name)
}

/// Device-type rule table, evaluated in priority order; a rule matches when
/// any of its ports is open. First match wins.
const DEVICE_RULES: &[(&[u16], DeviceType)] = &[
    (&[53, 67, 68], DeviceType::Router),
    (&[3306, 5432, 1433, 27017], DeviceType::Server),
    (&[631, 9100], DeviceType::Printer),
    (&[1883, 8883], DeviceType::Iot),
    (&[139, 445, 548], DeviceType::Computer),
];

/// Classify a device from its open-port set. Pure: same ports, same answer.
pub fn classify_device_type(open_ports: &[u16]) -> DeviceType {
    for (rule_ports, device_type) in DEVICE_RULES {
        if rule_ports.iter().any(|p| open_ports.contains(p)) {
            return *device_type;
        }
    }
    DeviceType::Unknown
}

/// Refine an Unknown classification using the manufacturer: phone and tablet
/// vendors rarely expose rule-table ports at all.
pub fn refine_with_manufacturer(base: DeviceType, manufacturer: Option<&str>) -> DeviceType {
    if base != DeviceType::Unknown {
        return base;
    }
    match manufacturer {
        Some(vendor) if MOBILE_VENDORS.iter().any(|m| vendor.contains(m)) => DeviceType::Mobile,
        _ => base,
    }
}

const MOBILE_VENDORS: &[&str] = &["Apple", "Samsung", "Google", "Xiaomi", "OnePlus", "Huawei"];

/// OUI prefix (first three octets) to manufacturer
const OUI_TABLE: &[(&str, &str)] = &[
    ("00:03:93", "Apple"),
    ("3C:22:FB", "Apple"),
    ("A8:5C:2C", "Apple"),
    ("F0:18:98", "Apple"),
    ("00:12:FB", "Samsung"),
    ("8C:71:F8", "Samsung"),
    ("F4:F5:D8", "Google"),
    ("3C:28:6D", "Google"),
    ("64:16:66", "Amazon"),
    ("FC:65:DE", "Amazon"),
    ("B8:27:EB", "Raspberry Pi Foundation"),
    ("DC:A6:32", "Raspberry Pi Foundation"),
    ("E4:5F:01", "Raspberry Pi Foundation"),
    ("00:11:32", "Synology"),
    ("00:09:0F", "Fortinet"),
    ("00:1D:AA", "Cisco"),
    ("58:97:1E", "Cisco"),
    ("74:AC:B9", "Ubiquiti"),
    ("FC:EC:DA", "Ubiquiti"),
    ("18:E8:29", "Ubiquiti"),
    ("50:C7:BF", "TP-Link"),
    ("A4:2B:B0", "TP-Link"),
    ("C0:56:27", "Belkin"),
    ("20:E5:2A", "Netgear"),
    ("A0:40:A0", "Netgear"),
    ("00:1F:33", "Netgear"),
    ("AC:22:0B", "Asus"),
    ("00:24:D7", "Intel"),
    ("3C:97:0E", "Intel"),
    ("00:14:22", "Dell"),
    ("18:66:DA", "Dell"),
    ("00:1B:78", "Hewlett Packard"),
    ("94:57:A5", "Hewlett Packard"),
    ("00:80:92", "Brother"),
    ("00:1E:8F", "Canon"),
    ("00:26:AB", "Seiko Epson"),
    ("EC:1A:59", "Belkin"),
    ("44:65:0D", "Amazon"),
    ("68:54:FD", "Amazon"),
    ("D0:73:D5", "LIFX"),
    ("B0:4E:26", "TP-Link"),
    ("00:17:88", "Philips Hue"),
    ("EC:B5:FA", "Philips Hue"),
];

/// Manufacturer for a MAC address, from the OUI prefix
pub fn manufacturer_for_mac(mac: &str) -> Option<&'static str> {
    let normalized = mac.trim().replace('-', ":").to_uppercase();
    let prefix = normalized.get(..8)?;
    OUI_TABLE
        .iter()
        .find(|(oui, _)| *oui == prefix)
        .map(|(_, vendor)| *vendor)
}

/// Reverse-DNS style hostname guess from manufacturer and IP, used when no
/// real hostname is known. Purely cosmetic for reports.
pub fn placeholder_hostname(manufacturer: Option<&str>, ip: Ipv4Addr) -> String {
    match manufacturer {
        Some(vendor) => format!(
            "{}-{}",
            vendor.to_lowercase().replace(' ', "-"),
            ip.octets()[3]
        ),
        None => format!("device-{}", ip.octets()[3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_openssh_banner() {
        let classifier = ServiceClassifier::new();
        let info = classifier.classify(Some("SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5"), 22);

        assert_eq!(info.service, "ssh");
        assert_eq!(info.product.as_deref(), Some("OpenSSH"));
        assert_eq!(info.version.as_deref(), Some("8.2p1"));
    }

    #[test]
    fn test_classify_nginx_server_header() {
        let classifier = ServiceClassifier::new();
        let banner = "HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\nContent-Type: text/html\r\n";
        let info = classifier.classify(Some(banner), 80);

        assert_eq!(info.service, "http");
        assert_eq!(info.product.as_deref(), Some("nginx"));
        assert_eq!(info.version.as_deref(), Some("1.18.0"));
    }

    #[test]
    fn test_classify_generic_server_header() {
        let classifier = ServiceClassifier::new();
        let banner = "HTTP/1.1 200 OK\r\nServer: lighttpd/1.4.59\r\n";
        let info = classifier.classify(Some(banner), 80);

        assert_eq!(info.service, "http");
        assert_eq!(info.product.as_deref(), Some("lighttpd"));
        assert_eq!(info.version.as_deref(), Some("1.4.59"));
    }

    #[test]
    fn test_classify_mariadb_before_mysql() {
        let classifier = ServiceClassifier::new();
        let info = classifier.classify(Some("5.5.5-10.6.12-MariaDB-0ubuntu0.22.04.1"), 3306);
        assert_eq!(info.product.as_deref(), Some("MariaDB"));
    }

    #[test]
    fn test_unparseable_banner_degrades_to_port_name() {
        let classifier = ServiceClassifier::new();
        let info = classifier.classify(Some("\x01\x02binary junk"), 22);
        assert_eq!(info.service, "ssh");
        assert!(info.product.is_none());
        assert!(info.version.is_none());
    }

    #[test]
    fn test_no_banner_unknown_port() {
        let classifier = ServiceClassifier::new();
        let info = classifier.classify(None, 31337);
        assert_eq!(info.service, "Unknown");
    }

    #[test]
    fn test_device_classification_rules() {
        assert_eq!(classify_device_type(&[53, 80, 443]), DeviceType::Router);
        assert_eq!(classify_device_type(&[22, 3306]), DeviceType::Server);
        assert_eq!(classify_device_type(&[631]), DeviceType::Printer);
        assert_eq!(classify_device_type(&[1883, 80]), DeviceType::Iot);
        assert_eq!(classify_device_type(&[139, 445]), DeviceType::Computer);
        assert_eq!(classify_device_type(&[22, 80]), DeviceType::Unknown);
        assert_eq!(classify_device_type(&[]), DeviceType::Unknown);
    }

    #[test]
    fn test_device_classification_priority_order() {
        // Router rule outranks Server and Computer when sets overlap
        assert_eq!(
            classify_device_type(&[53, 3306, 445]),
            DeviceType::Router
        );
        // Server outranks Printer
        assert_eq!(classify_device_type(&[5432, 9100]), DeviceType::Server);
    }

    #[test]
    fn test_device_classification_is_pure() {
        let ports = [22, 80, 445];
        let first = classify_device_type(&ports);
        for _ in 0..10 {
            assert_eq!(classify_device_type(&ports), first);
        }
    }

    #[test]
    fn test_manufacturer_lookup() {
        assert_eq!(
            manufacturer_for_mac("B8:27:EB:AA:BB:CC"),
            Some("Raspberry Pi Foundation")
        );
        assert_eq!(manufacturer_for_mac("b8-27-eb-aa-bb-cc"), Some("Raspberry Pi Foundation"));
        assert_eq!(manufacturer_for_mac("FF:FF:FF:00:00:00"), None);
        assert_eq!(manufacturer_for_mac("short"), None);
    }

    #[test]
    fn test_mobile_vendor_refinement() {
        assert_eq!(
            refine_with_manufacturer(DeviceType::Unknown, Some("Apple")),
            DeviceType::Mobile
        );
        // Port rules always win over vendor hints
        assert_eq!(
            refine_with_manufacturer(DeviceType::Server, Some("Apple")),
            DeviceType::Server
        );
        assert_eq!(
            refine_with_manufacturer(DeviceType::Unknown, None),
            DeviceType::Unknown
        );
    }

    #[test]
    fn test_os_hint() {
        let classifier = ServiceClassifier::new();
        assert_eq!(
            classifier.os_hint(&["SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5"]),
            Some(String::from("Ubuntu Linux"))
        );
        assert_eq!(
            classifier.os_hint(&["Server: Microsoft-IIS/10.0"]),
            Some(String::from("Windows"))
        );
        assert_eq!(classifier.os_hint(&["no clues here"]), None);
    }

    #[test]
    fn test_placeholder_hostname() {
        let ip = Ipv4Addr::new(192, 168, 1, 42);
        assert_eq!(
            placeholder_hostname(Some("Raspberry Pi Foundation"), ip),
            "raspberry-pi-foundation-42"
        );
        assert_eq!(placeholder_hostname(None, ip), "device-42");
    }
}
