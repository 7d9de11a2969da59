//! LanWarden Scanner - home network security scanner
//!
//! One-shot CLI: discover the hosts on a /24 subnet, scan their ports,
//! classify and score them, and print (or persist) the report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lanwarden_analysis::{ComplianceReport, DeviceReputation, ThreatAnalyzer, ThreatSummary};
use lanwarden_common::store::{self, keys, KvStore};
use lanwarden_common::{Config, FileStore};
use lanwarden_core::{DeviceInventory, ScanMode, Subnet};
use lanwarden_engine::{ScanEvent, ScanOrchestrator};
use lanwarden_network::cancel_pair;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// LanWarden network scanner
#[derive(Parser, Debug)]
#[command(name = "lanwarden")]
#[command(version)]
#[command(about = "Scan a home network for devices, services, and risks", long_about = None)]
struct Args {
    /// Subnet prefix to scan, e.g. "192.168.1"
    subnet: String,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/lanwarden/config.toml")]
    config: String,

    /// Scan thoroughness (quick, standard, comprehensive)
    #[arg(short, long)]
    mode: Option<String>,

    /// Directory for persisted state (inventory, uptime history)
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Known device, MAC=NAME; repeatable
    #[arg(short, long = "known")]
    known: Vec<String>,

    /// Emit the full report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (pretty, json, compact)
    #[arg(long, default_value = "compact")]
    log_format: String,
}

/// Everything a scan produced, in one serializable bundle
#[derive(Debug, Serialize)]
struct FullReport {
    cancelled: bool,
    inventory: DeviceInventory,
    reputations: HashMap<String, DeviceReputation>,
    threats: ThreatSummary,
    compliance: ComplianceReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = lanwarden_common::logging::LogConfig::new()
        .level(&args.log_level)
        .format(lanwarden_common::logging::LogFormat::from_name(
            &args.log_format,
        ));
    lanwarden_common::logging::init_logging_with_config(log_config);

    info!("LanWarden {} starting", env!("CARGO_PKG_VERSION"));

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)
            .with_context(|| format!("loading config from {}", args.config))?
    } else {
        Config::default()
    };
    let config = config.merge_env();

    let subnet = Subnet::parse(&args.subnet)?;
    let mode = match args.mode.as_deref() {
        Some(name) => name.parse::<ScanMode>()?,
        None => config.scanner.mode,
    };

    let allowlist = parse_allowlist(&args.known)?;

    // Persisted state lets repeat scans keep first_seen, uptime history,
    // and offline carryover.
    let file_store = match &args.data_dir {
        Some(dir) => Some(FileStore::new(dir)?),
        None => None,
    };
    let mut orchestrator = ScanOrchestrator::from_config(&config).with_allowlist(allowlist);
    if let Some(kv) = &file_store {
        if let Some(previous) = store::get(kv, keys::DEVICES)? {
            orchestrator = orchestrator.with_previous_inventory(previous);
        }
        if let Some(uptime) = store::get(kv, keys::UPTIME)? {
            orchestrator = orchestrator.with_uptime_tracker(uptime);
        }
    }

    let (cancel_handle, cancel_token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight probes");
            cancel_handle.cancel();
        }
    });

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ScanEvent::StateChanged(state) => info!("Scan state: {}", state),
                ScanEvent::Progress { fraction, status } => {
                    info!("[{:>3.0}%] {}", fraction * 100.0, status)
                }
                ScanEvent::DeviceFound(device) => {
                    if !quiet {
                        info!(
                            "Found {} ({} open ports)",
                            device.ip_address,
                            device.open_ports.len()
                        );
                    }
                }
            }
        }
    });

    let outcome = orchestrator.run(&subnet, mode, events_tx, cancel_token).await?;
    let _ = printer.await;

    let cancelled = outcome.was_cancelled();
    let report = outcome.into_report();
    let threats = ThreatAnalyzer::new().analyze(&report.inventory);
    let compliance = ComplianceReport::baseline(&report.inventory);

    if let Some(kv) = &file_store {
        persist(kv, &report.inventory, orchestrator.uptime_tracker(), &report.reputations)?;
    }

    let full = FullReport {
        cancelled,
        inventory: report.inventory,
        reputations: report.reputations,
        threats,
        compliance,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&full)?);
    } else {
        print_report(&full);
    }

    Ok(())
}

fn parse_allowlist(entries: &[String]) -> Result<HashMap<String, String>> {
    let mut allowlist = HashMap::new();
    for entry in entries {
        let Some((mac, name)) = entry.split_once('=') else {
            bail!("--known expects MAC=NAME, got {:?}", entry);
        };
        allowlist.insert(mac.to_string(), name.to_string());
    }
    Ok(allowlist)
}

fn persist(
    kv: &dyn KvStore,
    inventory: &DeviceInventory,
    uptime: &lanwarden_analysis::UptimeTracker,
    reputations: &HashMap<String, DeviceReputation>,
) -> Result<()> {
    store::put(kv, keys::DEVICES, inventory)?;
    store::put(kv, keys::UPTIME, uptime)?;
    store::put(kv, keys::REPUTATION, reputations)?;
    info!("Persisted {} devices", inventory.len());
    Ok(())
}

fn print_report(report: &FullReport) {
    if report.cancelled {
        println!("\n== Scan cancelled; partial results ==");
    }

    println!(
        "\nDevices ({} total, {} online)",
        report.inventory.len(),
        report.inventory.online_count()
    );
    println!(
        "{:<16} {:<18} {:<9} {:<12} {:<6} {:<13} PORTS",
        "IP", "MAC", "TYPE", "NAME", "SCORE", "RATING"
    );
    for device in report.inventory.iter() {
        let reputation = report.reputations.get(&device.identity());
        let (score, rating) = match reputation {
            Some(r) => (r.score.to_string(), r.rating.as_str()),
            None => (String::from("-"), "-"),
        };
        let ports = device
            .open_port_numbers()
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut flags = String::new();
        if device.is_rogue {
            flags.push_str(" [ROGUE]");
        }
        if !device.is_online {
            flags.push_str(" [OFFLINE]");
        }
        println!(
            "{:<16} {:<18} {:<9} {:<12} {:<6} {:<13} {}{}",
            device.ip_address,
            device.mac_address.as_deref().unwrap_or("-"),
            device.device_type.as_str(),
            device.hostname.as_deref().unwrap_or("-"),
            score,
            rating,
            ports,
            flags
        );
    }

    if report.threats.total() > 0 {
        println!(
            "\nThreats ({} findings: {} critical, {} high, {} medium, {} low)",
            report.threats.total(),
            report.threats.critical,
            report.threats.high,
            report.threats.medium,
            report.threats.low
        );
        for finding in &report.threats.findings {
            println!(
                "  [{}] {} - {}: {}",
                finding.severity, finding.device_id, finding.title, finding.detail
            );
        }
    } else {
        println!("\nNo threats found");
    }

    println!(
        "\nCompliance ({}): {}/{} checks passed",
        report.compliance.framework,
        report.compliance.passed,
        report.compliance.checks.len()
    );
    for check in &report.compliance.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        print!("  [{}] {}", status, check.name);
        if !check.failing_devices.is_empty() {
            print!(" ({})", check.failing_devices.join(", "));
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowlist() {
        let entries = vec![String::from("AA:BB:CC:DD:EE:FF=NAS")];
        let allowlist = parse_allowlist(&entries).unwrap();
        assert_eq!(allowlist["AA:BB:CC:DD:EE:FF"], "NAS");

        assert!(parse_allowlist(&[String::from("no-separator")]).is_err());
    }
}
