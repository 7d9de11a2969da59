//! Device reputation scoring
//!
//! The score starts at a neutral baseline and every adjustment is retained as
//! a `ReputationFactor`, so a report can always show why a device landed
//! where it did. Scoring is a pure function of the device, its uptime
//! history, and its incident count.

use crate::uptime::UptimeRecord;
use lanwarden_core::target::{is_backdoor_port, is_dangerous_port};
use lanwarden_core::{Device, DeviceInventory, DeviceType};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BASELINE_SCORE: i32 = 50;

/// Observations below this count are too thin to judge availability
const MIN_UPTIME_OBSERVATIONS: usize = 10;

/// Reputation rating bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReputationRating {
    Trusted,
    Reliable,
    Acceptable,
    Questionable,
    Untrusted,
}

impl ReputationRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => ReputationRating::Trusted,
            75..=89 => ReputationRating::Reliable,
            60..=74 => ReputationRating::Acceptable,
            40..=59 => ReputationRating::Questionable,
            _ => ReputationRating::Untrusted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationRating::Trusted => "Trusted",
            ReputationRating::Reliable => "Reliable",
            ReputationRating::Acceptable => "Acceptable",
            ReputationRating::Questionable => "Questionable",
            ReputationRating::Untrusted => "Untrusted",
        }
    }
}

impl std::fmt::Display for ReputationRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scoring adjustment, kept for the report breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationFactor {
    /// Grouping label ("Device Type", "Open Ports", ...)
    pub category: String,
    /// Signed score delta
    pub impact: i32,
    /// Human-readable explanation
    pub reason: String,
}

impl ReputationFactor {
    fn new(category: &str, impact: i32, reason: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            impact,
            reason: reason.into(),
        }
    }
}

/// Scored reputation for one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReputation {
    /// Device identity key (MAC when known, else IP)
    pub device_id: String,
    /// Final score, clamped to [0, 100]
    pub score: u8,
    pub rating: ReputationRating,
    /// Every adjustment that produced the score, in application order
    pub factors: Vec<ReputationFactor>,
}

/// Reputation scorer with static manufacturer trust lists
pub struct ReputationScorer {
    trusted_manufacturers: Vec<&'static str>,
    reliable_manufacturers: Vec<&'static str>,
    questionable_manufacturers: Vec<&'static str>,
}

impl Default for ReputationScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReputationScorer {
    pub fn new() -> Self {
        Self {
            trusted_manufacturers: vec![
                "Apple",
                "Cisco",
                "Ubiquiti",
                "Synology",
                "Intel",
                "Hewlett Packard",
                "Dell",
                "Fortinet",
            ],
            reliable_manufacturers: vec![
                "Samsung",
                "Google",
                "Amazon",
                "Netgear",
                "Asus",
                "Brother",
                "Canon",
                "Seiko Epson",
                "Raspberry Pi Foundation",
                "Philips Hue",
            ],
            questionable_manufacturers: vec!["Shenzhen", "Generic", "Unknown OEM"],
        }
    }

    /// Score a device. Pure: the same inputs always produce the same
    /// reputation, factors in a fixed order.
    pub fn score(
        &self,
        device: &Device,
        uptime: Option<&UptimeRecord>,
        incident_count: u32,
    ) -> DeviceReputation {
        let mut factors = Vec::new();

        factors.push(self.device_type_factor(device.device_type));
        if let Some(factor) = self.manufacturer_factor(device.manufacturer.as_deref()) {
            factors.push(factor);
        }
        factors.extend(self.port_factors(device));
        factors.extend(self.identity_factors(device));
        if let Some(factor) = self.uptime_factor(uptime) {
            factors.push(factor);
        }
        if incident_count > 0 {
            let penalty = (incident_count as i32 * -10).max(-40);
            factors.push(ReputationFactor::new(
                "Security Incidents",
                penalty,
                format!("{} recorded incident(s)", incident_count),
            ));
        }
        if !device.is_online {
            factors.push(ReputationFactor::new(
                "Availability",
                -10,
                "Device did not respond during the last scan",
            ));
        }

        let raw: i32 = BASELINE_SCORE + factors.iter().map(|f| f.impact).sum::<i32>();
        let score = raw.clamp(0, 100) as u8;
        let rating = ReputationRating::from_score(score);

        debug!(
            "Scored {} at {} ({}) from {} factors",
            device.identity(),
            score,
            rating,
            factors.len()
        );

        DeviceReputation {
            device_id: device.identity(),
            score,
            rating,
            factors,
        }
    }

    fn device_type_factor(&self, device_type: DeviceType) -> ReputationFactor {
        let impact = match device_type {
            DeviceType::Router => 10,
            DeviceType::Server | DeviceType::Computer | DeviceType::Mobile => 5,
            DeviceType::Printer => 0,
            DeviceType::Iot => -10,
            DeviceType::Unknown => -5,
        };
        ReputationFactor::new(
            "Device Type",
            impact,
            format!("Classified as {}", device_type),
        )
    }

    fn manufacturer_factor(&self, manufacturer: Option<&str>) -> Option<ReputationFactor> {
        let vendor = manufacturer?;
        let (impact, label) = if self.trusted_manufacturers.iter().any(|m| vendor.contains(m)) {
            (10, "trusted")
        } else if self.reliable_manufacturers.iter().any(|m| vendor.contains(m)) {
            (5, "reliable")
        } else if self
            .questionable_manufacturers
            .iter()
            .any(|m| vendor.contains(m))
        {
            (-15, "questionable")
        } else {
            return None;
        };
        Some(ReputationFactor::new(
            "Manufacturer",
            impact,
            format!("{} is a {} vendor", vendor, label),
        ))
    }

    fn port_factors(&self, device: &Device) -> Vec<ReputationFactor> {
        let mut factors = Vec::new();
        let open_ports = device.open_port_numbers();

        for &port in open_ports.iter().filter(|&&p| is_dangerous_port(p)) {
            factors.push(ReputationFactor::new(
                "Open Ports",
                -8,
                format!("Dangerous port {} exposed", port),
            ));
        }

        let backdoor: Vec<u16> = open_ports
            .iter()
            .copied()
            .filter(|&p| is_backdoor_port(p))
            .collect();
        if !backdoor.is_empty() {
            let listed = backdoor
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            factors.push(ReputationFactor::new(
                "Malware Indicators",
                -40,
                format!("Known backdoor port(s) open: {}", listed),
            ));
        }

        let surface_penalty = match open_ports.len() {
            0..=3 => 0,
            4..=7 => -5,
            8..=14 => -10,
            _ => -20,
        };
        if surface_penalty != 0 {
            factors.push(ReputationFactor::new(
                "Attack Surface",
                surface_penalty,
                format!("{} open ports", open_ports.len()),
            ));
        }

        if open_ports.contains(&443) || open_ports.contains(&22) {
            factors.push(ReputationFactor::new(
                "Secure Protocols",
                5,
                "Encrypted management available (443/22)",
            ));
        }

        factors
    }

    fn identity_factors(&self, device: &Device) -> Vec<ReputationFactor> {
        let mut factors = Vec::new();
        if device.is_rogue {
            factors.push(ReputationFactor::new(
                "Rogue Device",
                -30,
                "Recently appeared and not on the allowlist",
            ));
        } else if device.is_known_device {
            factors.push(ReputationFactor::new(
                "Known Device",
                15,
                "On the allowlist",
            ));
        }
        factors
    }

    fn uptime_factor(&self, uptime: Option<&UptimeRecord>) -> Option<ReputationFactor> {
        let record = uptime?;
        if record.observation_count() < MIN_UPTIME_OBSERVATIONS {
            return None;
        }
        let pct = record.uptime_percentage();
        let impact = if pct >= 99.0 {
            5
        } else if pct >= 95.0 {
            2
        } else if pct < 70.0 {
            -5
        } else {
            return None;
        };
        Some(ReputationFactor::new(
            "Uptime",
            impact,
            format!("{:.1}% availability", pct),
        ))
    }
}

/// Aggregate statistics over a scored inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationStatistics {
    pub device_count: usize,
    pub average_score: f64,
    pub trusted: usize,
    pub reliable: usize,
    pub acceptable: usize,
    pub questionable: usize,
    pub untrusted: usize,
    /// Device ids with the lowest scores, worst first (up to five)
    pub lowest_devices: Vec<(String, u8)>,
}

impl ReputationStatistics {
    pub fn from_reputations(reputations: &[DeviceReputation]) -> Self {
        let device_count = reputations.len();
        let average_score = if device_count == 0 {
            0.0
        } else {
            reputations.iter().map(|r| r.score as f64).sum::<f64>() / device_count as f64
        };

        let count = |rating: ReputationRating| {
            reputations.iter().filter(|r| r.rating == rating).count()
        };

        let mut lowest: Vec<(String, u8)> = reputations
            .iter()
            .map(|r| (r.device_id.clone(), r.score))
            .collect();
        lowest.sort_by_key(|(_, score)| *score);
        lowest.truncate(5);

        Self {
            device_count,
            average_score,
            trusted: count(ReputationRating::Trusted),
            reliable: count(ReputationRating::Reliable),
            acceptable: count(ReputationRating::Acceptable),
            questionable: count(ReputationRating::Questionable),
            untrusted: count(ReputationRating::Untrusted),
            lowest_devices: lowest,
        }
    }

    /// Score the whole inventory and aggregate in one pass
    pub fn from_inventory(scorer: &ReputationScorer, inventory: &DeviceInventory) -> Self {
        let reputations: Vec<DeviceReputation> = inventory
            .iter()
            .map(|d| scorer.score(d, None, 0))
            .collect();
        Self::from_reputations(&reputations)
    }
}
