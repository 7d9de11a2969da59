//! Phased host discovery over a /24 subnet
//!
//! Four phases run in strict sequence, each unioning its findings into a
//! running set: the ARP neighbor table, previously-seen device octets,
//! configured common ranges, and finally the full 1-254 sweep. Timeouts
//! escalate across phases on purpose - the fast phases surface the usual
//! suspects early while the exhaustive sweep runs last. A host counts as
//! alive on any single probe success; individual probe failures are silent
//! and never retried within a phase.

use crate::cancel::CancelToken;
use futures::stream::{self, StreamExt};
use lanwarden_core::Subnet;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Host liveness capability
///
/// `arp_table` may return an empty table where the platform neighbor cache is
/// unreadable (sandboxing, unsupported OS) - a documented capability gap, not
/// an error. `is_alive` is an in-process connect check; no external ping
/// process is ever spawned.
pub trait LivenessProbe: Send + Sync + 'static {
    fn arp_table(&self) -> impl Future<Output = Vec<(Ipv4Addr, String)>> + Send;

    fn is_alive(&self, ip: Ipv4Addr, deadline: Duration) -> impl Future<Output = bool> + Send;
}

/// TCP-connect liveness probe
///
/// ICMP echo needs raw sockets, so liveness is inferred from TCP behavior on
/// a handful of commonly-open ports: a completed or refused connection both
/// prove a host is there.
#[derive(Debug, Clone)]
pub struct TcpLivenessProbe {
    ports: Vec<u16>,
}

impl Default for TcpLivenessProbe {
    fn default() -> Self {
        Self {
            ports: vec![80, 443, 22, 445, 8080, 62078],
        }
    }
}

impl TcpLivenessProbe {
    pub fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }
}

impl LivenessProbe for TcpLivenessProbe {
    async fn arp_table(&self) -> Vec<(Ipv4Addr, String)> {
        read_system_arp_table()
    }

    async fn is_alive(&self, ip: Ipv4Addr, deadline: Duration) -> bool {
        use crate::probe::{Probe, TcpProbe};

        // All candidate ports race under one shared deadline; the first
        // outcome that proves liveness wins.
        let probe = TcpProbe::new();
        let probes = self
            .ports
            .iter()
            .map(|&port| async move { probe.probe(ip, port, deadline).await });

        let mut unordered: futures::stream::FuturesUnordered<_> = probes.collect();
        while let Some(outcome) = unordered.next().await {
            if outcome.indicates_alive() {
                return true;
            }
        }
        false
    }
}

/// Read the platform neighbor cache. Linux exposes it at /proc/net/arp;
/// elsewhere this returns an empty table.
pub fn read_system_arp_table() -> Vec<(Ipv4Addr, String)> {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string("/proc/net/arp") {
            Ok(content) => parse_proc_net_arp(&content),
            Err(e) => {
                warn!("ARP table unreadable ({}); discovery proceeds without it", e);
                Vec::new()
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Parse /proc/net/arp contents: "IP HWtype Flags HWaddress Mask Device"
fn parse_proc_net_arp(content: &str) -> Vec<(Ipv4Addr, String)> {
    let mut entries = Vec::new();
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(ip) = fields[0].parse::<Ipv4Addr>() else {
            continue;
        };
        let mac = fields[3].to_uppercase();
        // Incomplete entries carry a zero MAC
        if mac == "00:00:00:00:00:00" {
            continue;
        }
        entries.push((ip, mac));
    }
    entries
}

/// One of the four sequential discovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    ArpTable,
    KnownDevices,
    CommonRanges,
    FullSweep,
}

impl DiscoveryPhase {
    /// Share of total discovery progress carried by this phase
    pub fn weight(&self) -> f64 {
        match self {
            DiscoveryPhase::ArpTable => 0.20,
            DiscoveryPhase::KnownDevices => 0.05,
            DiscoveryPhase::CommonRanges => 0.25,
            DiscoveryPhase::FullSweep => 0.50,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DiscoveryPhase::ArpTable => "Reading ARP table",
            DiscoveryPhase::KnownDevices => "Checking known devices",
            DiscoveryPhase::CommonRanges => "Probing common ranges",
            DiscoveryPhase::FullSweep => "Sweeping full subnet",
        }
    }

    fn base_fraction(&self) -> f64 {
        match self {
            DiscoveryPhase::ArpTable => 0.0,
            DiscoveryPhase::KnownDevices => 0.20,
            DiscoveryPhase::CommonRanges => 0.25,
            DiscoveryPhase::FullSweep => 0.50,
        }
    }
}

/// Incremental discovery progress event
#[derive(Debug, Clone)]
pub struct DiscoveryProgress {
    pub phase: DiscoveryPhase,
    /// Overall discovery fraction in [0,1]
    pub fraction: f64,
    /// Hosts found so far
    pub found: usize,
}

/// Final discovery output
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Reachable addresses, ascending numeric order
    pub ips: Vec<Ipv4Addr>,
    /// MAC addresses harvested from the ARP table
    pub macs: HashMap<Ipv4Addr, String>,
}

/// Host discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Last octets of previously-seen devices, probed in the fast phase
    pub known_octets: Vec<u8>,
    /// Likely-occupied last-octet ranges (inclusive)
    pub common_ranges: Vec<(u8, u8)>,
    /// Known-device phase timeout
    pub known_timeout: Duration,
    /// Common-range phase timeout
    pub common_timeout: Duration,
    /// Full-sweep phase timeout
    pub sweep_timeout: Duration,
    /// Maximum concurrent liveness probes
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            known_octets: Vec::new(),
            common_ranges: vec![(1, 10), (20, 100), (100, 200), (200, 254)],
            known_timeout: Duration::from_millis(300),
            common_timeout: Duration::from_millis(400),
            sweep_timeout: Duration::from_millis(500),
            concurrency: 64,
        }
    }
}

/// Multi-phase host discoverer, generic over the liveness capability
pub struct HostDiscoverer<L: LivenessProbe> {
    config: DiscoveryConfig,
    liveness: L,
}

impl<L: LivenessProbe> HostDiscoverer<L> {
    pub fn new(liveness: L) -> Self {
        Self {
            config: DiscoveryConfig::default(),
            liveness,
        }
    }

    pub fn with_config(liveness: L, config: DiscoveryConfig) -> Self {
        Self { config, liveness }
    }

    /// Run all four phases and return the deduplicated, sorted host set.
    /// The found set only grows: no phase removes an earlier result.
    pub async fn discover(
        &self,
        subnet: &Subnet,
        cancel: &CancelToken,
        progress: Option<mpsc::UnboundedSender<DiscoveryProgress>>,
    ) -> DiscoveryReport {
        let mut found: BTreeSet<Ipv4Addr> = BTreeSet::new();
        let mut macs: HashMap<Ipv4Addr, String> = HashMap::new();

        // Phase 1: ARP neighbor cache
        if !cancel.is_cancelled() {
            info!("Discovery phase 1/4: {}", DiscoveryPhase::ArpTable.label());
            for (ip, mac) in self.liveness.arp_table().await {
                if subnet.contains(ip) {
                    found.insert(ip);
                    macs.insert(ip, mac);
                }
            }
            emit(&progress, DiscoveryPhase::ArpTable, 1.0, found.len());
            debug!("ARP table phase found {} hosts", found.len());
        }

        // Phase 2: previously-seen devices, short timeout
        if !cancel.is_cancelled() && !self.config.known_octets.is_empty() {
            info!(
                "Discovery phase 2/4: {}",
                DiscoveryPhase::KnownDevices.label()
            );
            let targets: Vec<Ipv4Addr> = self
                .config
                .known_octets
                .iter()
                .map(|&o| subnet.host(o))
                .filter(|ip| !found.contains(ip))
                .collect();
            self.probe_phase(
                DiscoveryPhase::KnownDevices,
                targets,
                self.config.known_timeout,
                cancel,
                &progress,
                &mut found,
            )
            .await;
        } else {
            emit(&progress, DiscoveryPhase::KnownDevices, 1.0, found.len());
        }

        // Phase 3: common ranges, medium timeout
        if !cancel.is_cancelled() {
            info!(
                "Discovery phase 3/4: {}",
                DiscoveryPhase::CommonRanges.label()
            );
            let mut targets: Vec<Ipv4Addr> = Vec::new();
            let mut queued: BTreeSet<Ipv4Addr> = BTreeSet::new();
            for &(start, end) in &self.config.common_ranges {
                for octet in start..=end.min(254) {
                    let ip = subnet.host(octet);
                    if !found.contains(&ip) && queued.insert(ip) {
                        targets.push(ip);
                    }
                }
            }
            self.probe_phase(
                DiscoveryPhase::CommonRanges,
                targets,
                self.config.common_timeout,
                cancel,
                &progress,
                &mut found,
            )
            .await;
        }

        // Phase 4: everything not yet covered, standard timeout
        if !cancel.is_cancelled() {
            info!("Discovery phase 4/4: {}", DiscoveryPhase::FullSweep.label());
            let targets: Vec<Ipv4Addr> =
                subnet.hosts().filter(|ip| !found.contains(ip)).collect();
            self.probe_phase(
                DiscoveryPhase::FullSweep,
                targets,
                self.config.sweep_timeout,
                cancel,
                &progress,
                &mut found,
            )
            .await;
        }

        info!("Discovery complete: {} hosts reachable", found.len());
        DiscoveryReport {
            ips: found.into_iter().collect(),
            macs,
        }
    }

    /// Probe a target list with bounded fan-out, unioning successes into the
    /// running set and emitting incremental progress.
    async fn probe_phase(
        &self,
        phase: DiscoveryPhase,
        targets: Vec<Ipv4Addr>,
        deadline: Duration,
        cancel: &CancelToken,
        progress: &Option<mpsc::UnboundedSender<DiscoveryProgress>>,
        found: &mut BTreeSet<Ipv4Addr>,
    ) {
        let total = targets.len();
        if total == 0 {
            emit(progress, phase, 1.0, found.len());
            return;
        }

        let mut completed = 0usize;
        let mut results = stream::iter(targets)
            .map(|ip| {
                let liveness = &self.liveness;
                async move { (ip, liveness.is_alive(ip, deadline).await) }
            })
            .buffer_unordered(self.config.concurrency);

        while let Some((ip, alive)) = results.next().await {
            completed += 1;
            if alive {
                found.insert(ip);
                debug!("Host {} is up ({})", ip, phase.label());
            }
            emit(progress, phase, completed as f64 / total as f64, found.len());
            if cancel.is_cancelled() {
                debug!("Discovery cancelled during {}", phase.label());
                break;
            }
        }
    }
}

fn emit(
    progress: &Option<mpsc::UnboundedSender<DiscoveryProgress>>,
    phase: DiscoveryPhase,
    phase_fraction: f64,
    found: usize,
) {
    if let Some(tx) = progress {
        let fraction = phase.base_fraction() + phase.weight() * phase_fraction.clamp(0.0, 1.0);
        let _ = tx.send(DiscoveryProgress {
            phase,
            fraction,
            found,
        });
    }
}
