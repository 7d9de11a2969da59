//! Scan orchestration - one scan from discovery to scored inventory
//!
//! The orchestrator is the only writer of the inventory while a scan runs.
//! Host workers send results back over the fan-out stream and the
//! orchestrator folds them in as they complete, so devices stream out of
//! order but the final inventory is sorted. Progress fractions are monotone:
//! discovery maps into [0, 0.45], per-host scanning into [0.45, 0.95], and
//! classification plus scoring close out the last 5%.
//!
//! Everything is injected at construction. No global state.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use lanwarden_analysis::{DeviceReputation, ReputationScorer, UptimeTracker};
use lanwarden_common::Config;
use lanwarden_core::target::validate_port_set;
use lanwarden_core::{Device, DeviceInventory, Error, Result, ScanMode, Subnet};
use lanwarden_network::{
    cancel_pair, classify_device_type, manufacturer_for_mac, refine_with_manufacturer,
    BannerGrabber, CancelHandle, CancelToken, DiscoveryConfig, DiscoveryProgress, HostDiscoverer,
    LivenessProbe, PortScanConfig, PortScanner, Probe, ServiceClassifier, TcpLivenessProbe,
    TcpProbe,
};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Share of overall progress consumed by discovery
const DISCOVERY_SHARE: f64 = 0.45;
/// Share consumed by per-host port scanning
const SCANNING_SHARE: f64 = 0.50;

/// Scan lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Discovering,
    Scanning,
    Classifying,
    Scoring,
    Complete,
    Cancelled,
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Discovering => "discovering",
            ScanState::Scanning => "scanning",
            ScanState::Classifying => "classifying",
            ScanState::Scoring => "scoring",
            ScanState::Complete => "complete",
            ScanState::Cancelled => "cancelled",
            ScanState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Complete | ScanState::Cancelled | ScanState::Failed
        )
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted while a scan runs
#[derive(Debug, Clone)]
pub enum ScanEvent {
    StateChanged(ScanState),
    /// Monotone overall progress in [0, 1] with a status line
    Progress { fraction: f64, status: String },
    /// A host finished scanning; devices stream out of completion order
    DeviceFound(Device),
}

/// Final product of a scan run
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub inventory: DeviceInventory,
    /// Reputation per device identity; empty for cancelled runs
    pub reputations: HashMap<String, DeviceReputation>,
}

/// How a scan ended. Cancellation keeps its partial results and is not an
/// error; genuine failures surface as `Err` from `run`.
#[derive(Debug)]
pub enum ScanOutcome {
    Complete(ScanReport),
    Cancelled(ScanReport),
}

impl ScanOutcome {
    pub fn report(&self) -> &ScanReport {
        match self {
            ScanOutcome::Complete(report) | ScanOutcome::Cancelled(report) => report,
        }
    }

    pub fn into_report(self) -> ScanReport {
        match self {
            ScanOutcome::Complete(report) | ScanOutcome::Cancelled(report) => report,
        }
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled(_))
    }
}

/// Handle to a scan running in a spawned task
pub struct ScanHandle {
    /// Event stream for the running scan
    pub events: mpsc::UnboundedReceiver<ScanEvent>,
    /// Cancels the scan; in-flight probes resolve naturally
    pub cancel: CancelHandle,
    task: tokio::task::JoinHandle<Result<ScanOutcome>>,
}

impl ScanHandle {
    /// Wait for the scan to finish
    pub async fn join(self) -> Result<ScanOutcome> {
        self.task
            .await
            .map_err(|e| Error::ScanFailed(format!("scan task aborted: {}", e)))?
    }
}

/// Drives one scan at a time over injected capabilities
pub struct ScanOrchestrator<L: LivenessProbe, P: Probe> {
    discoverer: HostDiscoverer<L>,
    scanner: PortScanner<P>,
    classifier: ServiceClassifier,
    scorer: ReputationScorer,
    banner_grabber: Option<BannerGrabber>,
    /// Normalized MAC -> assigned name
    allowlist: HashMap<String, String>,
    /// Device identity -> recorded incident count
    incidents: HashMap<String, u32>,
    previous: DeviceInventory,
    uptime: UptimeTracker,
    rogue_window: chrono::Duration,
    host_concurrency: usize,
    state: ScanState,
}

impl ScanOrchestrator<TcpLivenessProbe, TcpProbe> {
    /// Wire up the production engine from configuration
    pub fn from_config(config: &Config) -> Self {
        let liveness = TcpLivenessProbe::new(config.discovery.liveness_ports.clone());
        let discovery = DiscoveryConfig {
            known_octets: config.discovery.known_octets.clone(),
            common_ranges: config.discovery.common_ranges.clone(),
            known_timeout: Duration::from_millis(config.discovery.known_timeout_ms),
            common_timeout: Duration::from_millis(config.discovery.common_timeout_ms),
            sweep_timeout: Duration::from_millis(config.discovery.sweep_timeout_ms),
            concurrency: config.discovery.concurrency,
        };
        let scan = PortScanConfig {
            timeout: Duration::from_millis(config.scanner.port_timeout_ms),
            concurrency: config.scanner.port_concurrency,
        };
        let banner_grabber = config.scanner.grab_banners.then(|| {
            BannerGrabber::new()
                .with_connect_timeout(Duration::from_millis(config.scanner.banner_timeout_ms))
                .with_read_timeout(Duration::from_millis(config.scanner.banner_timeout_ms))
        });

        Self::new(
            HostDiscoverer::with_config(liveness, discovery),
            PortScanner::with_config(TcpProbe::new(), scan),
        )
        .with_banner_grabber(banner_grabber)
        .with_rogue_window(chrono::Duration::minutes(
            config.reputation.rogue_window_minutes as i64,
        ))
        .with_host_concurrency(config.scanner.host_concurrency)
        .with_uptime_capacity(config.uptime.capacity)
    }
}

impl<L: LivenessProbe, P: Probe> ScanOrchestrator<L, P> {
    pub fn new(discoverer: HostDiscoverer<L>, scanner: PortScanner<P>) -> Self {
        Self {
            discoverer,
            scanner,
            classifier: ServiceClassifier::new(),
            scorer: ReputationScorer::new(),
            banner_grabber: None,
            allowlist: HashMap::new(),
            incidents: HashMap::new(),
            previous: DeviceInventory::new(),
            uptime: UptimeTracker::new(),
            rogue_window: chrono::Duration::minutes(15),
            host_concurrency: 16,
            state: ScanState::Idle,
        }
    }

    pub fn with_banner_grabber(mut self, grabber: Option<BannerGrabber>) -> Self {
        self.banner_grabber = grabber;
        self
    }

    /// Allowlist of known devices: normalized MAC to assigned name
    pub fn with_allowlist(mut self, allowlist: HashMap<String, String>) -> Self {
        self.allowlist = allowlist
            .into_iter()
            .map(|(mac, name)| (lanwarden_core::device::normalize_mac(&mac), name))
            .collect();
        self
    }

    pub fn with_incidents(mut self, incidents: HashMap<String, u32>) -> Self {
        self.incidents = incidents;
        self
    }

    /// Seed cross-session state from a persisted inventory
    pub fn with_previous_inventory(mut self, inventory: DeviceInventory) -> Self {
        self.previous = inventory;
        self
    }

    pub fn with_uptime_tracker(mut self, uptime: UptimeTracker) -> Self {
        self.uptime = uptime;
        self
    }

    pub fn with_uptime_capacity(mut self, capacity: usize) -> Self {
        if self.uptime.is_empty() {
            self.uptime = UptimeTracker::with_capacity(capacity);
        }
        self
    }

    pub fn with_rogue_window(mut self, window: chrono::Duration) -> Self {
        self.rogue_window = window;
        self
    }

    pub fn with_host_concurrency(mut self, concurrency: usize) -> Self {
        self.host_concurrency = concurrency.max(1);
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Availability history accumulated across runs
    pub fn uptime_tracker(&self) -> &UptimeTracker {
        &self.uptime
    }

    /// Inventory from the most recent completed run
    pub fn last_inventory(&self) -> &DeviceInventory {
        &self.previous
    }

    /// Run one scan to completion. `Err` means the request itself was
    /// invalid; a cancelled scan is a successful `ScanOutcome::Cancelled`
    /// carrying everything collected before the cancel.
    pub async fn run(
        &mut self,
        subnet: &Subnet,
        mode: ScanMode,
        events: mpsc::UnboundedSender<ScanEvent>,
        cancel: CancelToken,
    ) -> Result<ScanOutcome> {
        let ports = mode.port_set();
        if let Err(e) = validate_port_set(&ports) {
            self.transition(&events, ScanState::Failed);
            return Err(e);
        }

        info!(
            "Starting {} scan of {}.0/24 ({} ports per host)",
            mode.as_str(),
            subnet.prefix(),
            ports.len()
        );

        // Discovery, progress scaled into [0, DISCOVERY_SHARE]
        self.transition(&events, ScanState::Discovering);
        let (dtx, mut drx) = mpsc::unbounded_channel::<DiscoveryProgress>();
        let forward_events = events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(progress) = drx.recv().await {
                let _ = forward_events.send(ScanEvent::Progress {
                    fraction: DISCOVERY_SHARE * progress.fraction,
                    status: format!("{} ({} found)", progress.phase.label(), progress.found),
                });
            }
        });
        let report = self.discoverer.discover(subnet, &cancel, Some(dtx)).await;
        let _ = forwarder.await;

        if cancel.is_cancelled() {
            // Hosts found before the cancel are kept, with no port data yet
            let mut inventory = DeviceInventory::new();
            for &ip in &report.ips {
                let device = self.assemble_device(ip, Vec::new(), report.macs.get(&ip));
                inventory.upsert(device);
            }
            return Ok(self.finalize_cancelled(&events, inventory));
        }

        // Per-host port scans, bounded fan-out; the orchestrator folds
        // results in as hosts complete.
        self.transition(&events, ScanState::Scanning);
        let mut inventory = DeviceInventory::new();
        let total = report.ips.len();
        let scanner = &self.scanner;
        let grabber = self.banner_grabber.as_ref();
        let port_set = &ports;

        let mut host_results = stream::iter(report.ips.iter().copied())
            .map(|ip| {
                let cancel = cancel.clone();
                async move {
                    let mut open = scanner.scan_open_ports(ip, port_set, &cancel).await;
                    if let Some(grabber) = grabber {
                        for port in open.iter_mut() {
                            port.banner = grabber.grab(ip, port.port).await;
                        }
                    }
                    (ip, open)
                }
            })
            .buffer_unordered(self.host_concurrency);

        let mut completed = 0usize;
        let mut cancelled = false;
        while let Some((ip, open_ports)) = host_results.next().await {
            completed += 1;
            let device = self.assemble_device(ip, open_ports, report.macs.get(&ip));
            let _ = events.send(ScanEvent::DeviceFound(device.clone()));
            inventory.upsert(device);

            let _ = events.send(ScanEvent::Progress {
                fraction: DISCOVERY_SHARE + SCANNING_SHARE * completed as f64 / total as f64,
                status: format!("Scanned {} of {} hosts", completed, total),
            });
            if cancel.is_cancelled() {
                warn!("Scan cancelled after {} of {} hosts", completed, total);
                cancelled = true;
                break;
            }
        }
        drop(host_results);

        if cancelled {
            // Discovered-but-unscanned hosts still belong in the partial
            // inventory, with empty port lists
            for &ip in &report.ips {
                if inventory.get(ip).is_none() {
                    let device = self.assemble_device(ip, Vec::new(), report.macs.get(&ip));
                    inventory.upsert(device);
                }
            }
            return Ok(self.finalize_cancelled(&events, inventory));
        }

        // Devices that vanished since the previous run stay in the report as
        // offline, keeping their last-known shape.
        let seen: HashSet<Ipv4Addr> = inventory.iter().map(|d| d.ip_address).collect();
        for prev in self.previous.iter() {
            if !seen.contains(&prev.ip_address) {
                let mut offline = prev.clone();
                offline.is_online = false;
                debug!("{} not seen this run, carried as offline", offline.ip_address);
                inventory.upsert(offline);
            }
        }

        self.transition(&events, ScanState::Classifying);
        self.classify_inventory(&mut inventory);
        let _ = events.send(ScanEvent::Progress {
            fraction: 0.97,
            status: String::from("Classified devices"),
        });

        self.transition(&events, ScanState::Scoring);
        inventory.sort_by_ip();
        let reputations = self.score_inventory(&inventory);
        let _ = events.send(ScanEvent::Progress {
            fraction: 1.0,
            status: String::from("Scan complete"),
        });

        self.previous = inventory.clone();
        self.transition(&events, ScanState::Complete);
        info!(
            "Scan complete: {} devices ({} online)",
            inventory.len(),
            inventory.online_count()
        );

        Ok(ScanOutcome::Complete(ScanReport {
            inventory,
            reputations,
        }))
    }

    /// Spawn the scan into a task, returning an event receiver and a cancel
    /// handle. Consumes the orchestrator for the lifetime of the scan.
    pub fn start_scan(
        mut self,
        subnet: Subnet,
        mode: ScanMode,
    ) -> ScanHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_handle, cancel_token) = cancel_pair();
        let task = tokio::spawn(async move {
            self.run(&subnet, mode, events_tx, cancel_token).await
        });
        ScanHandle {
            events: events_rx,
            cancel: cancel_handle,
            task,
        }
    }

    fn transition(&mut self, events: &mpsc::UnboundedSender<ScanEvent>, state: ScanState) {
        debug!("Scan state: {} -> {}", self.state, state);
        self.state = state;
        let _ = events.send(ScanEvent::StateChanged(state));
    }

    fn finalize_cancelled(
        &mut self,
        events: &mpsc::UnboundedSender<ScanEvent>,
        mut inventory: DeviceInventory,
    ) -> ScanOutcome {
        inventory.sort_by_ip();
        self.transition(events, ScanState::Cancelled);
        ScanOutcome::Cancelled(ScanReport {
            inventory,
            reputations: HashMap::new(),
        })
    }

    fn assemble_device(
        &self,
        ip: Ipv4Addr,
        open_ports: Vec<lanwarden_core::PortInfo>,
        mac: Option<&String>,
    ) -> Device {
        let mut device = Device::new(ip);
        if let Some(mac) = mac {
            device = device.with_mac(mac.clone());
        }
        for port in open_ports {
            device.add_port(port);
        }

        let history = device
            .mac_address
            .as_deref()
            .and_then(|m| self.previous.find_by_mac(m))
            .or_else(|| self.previous.get(ip));
        if let Some(prev) = history {
            device.inherit_history(prev);
        }
        device
    }

    /// Derive service labels, device types, manufacturers, OS hints, and the
    /// allowlist/rogue flags. Offline carryovers keep their last-known
    /// classification untouched.
    fn classify_inventory(&self, inventory: &mut DeviceInventory) {
        let now = Utc::now();
        for device in inventory.devices_mut() {
            if !device.is_online {
                continue;
            }

            for port in device.open_ports.iter_mut() {
                let info = self.classifier.classify(port.banner.as_deref(), port.port);
                port.service = info.service;
                if info.version.is_some() {
                    port.version = info.version;
                }
            }

            if device.manufacturer.is_none() {
                device.manufacturer = device
                    .mac_address
                    .as_deref()
                    .and_then(manufacturer_for_mac)
                    .map(String::from);
            }

            let open = device.open_port_numbers();
            device.device_type = refine_with_manufacturer(
                classify_device_type(&open),
                device.manufacturer.as_deref(),
            );

            if device.operating_system.is_none() {
                let banners: Vec<&str> = device
                    .open_ports
                    .iter()
                    .filter_map(|p| p.banner.as_deref())
                    .collect();
                device.operating_system = self.classifier.os_hint(&banners);
            }

            if let Some(name) = device
                .mac_address
                .as_deref()
                .and_then(|mac| self.allowlist.get(mac))
            {
                device.is_known_device = true;
                device.hostname = Some(name.clone());
            } else {
                device.is_known_device = false;
            }

            // Rogue: appeared inside the recency window and not allowlisted
            device.is_rogue =
                !device.is_known_device && now - device.first_seen <= self.rogue_window;
        }
    }

    /// Record one availability observation per device and score everything.
    /// Runs once per scan so uptime history grows by exactly one sample.
    fn score_inventory(&mut self, inventory: &DeviceInventory) -> HashMap<String, DeviceReputation> {
        for device in inventory.iter() {
            self.uptime.record(&device.identity(), device.is_online, None);
        }

        let mut reputations = HashMap::with_capacity(inventory.len());
        for device in inventory.iter() {
            let id = device.identity();
            let incidents = self.incidents.get(&id).copied().unwrap_or(0);
            let reputation = self.scorer.score(device, self.uptime.get(&id), incidents);
            reputations.insert(id, reputation);
        }
        reputations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwarden_core::{DeviceType, PortState};
    use lanwarden_network::ProbeOutcome;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted network: a set of alive hosts, each with its own open ports
    struct FakeNet {
        hosts: HashMap<u8, Vec<u16>>,
        arp: Vec<(Ipv4Addr, String)>,
    }

    struct FakeLiveness {
        alive: HashSet<u8>,
        arp: Vec<(Ipv4Addr, String)>,
    }

    impl LivenessProbe for FakeLiveness {
        async fn arp_table(&self) -> Vec<(Ipv4Addr, String)> {
            self.arp.clone()
        }

        async fn is_alive(&self, ip: Ipv4Addr, _deadline: Duration) -> bool {
            self.alive.contains(&ip.octets()[3])
        }
    }

    struct FakeProbe {
        open: HashMap<u8, Vec<u16>>,
        issued: Arc<AtomicUsize>,
    }

    impl Probe for FakeProbe {
        async fn probe(&self, ip: Ipv4Addr, port: u16, _deadline: Duration) -> ProbeOutcome {
            self.issued.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match self.open.get(&ip.octets()[3]) {
                Some(ports) if ports.contains(&port) => ProbeOutcome::Open { rtt_ms: 1 },
                _ => ProbeOutcome::Refused,
            }
        }
    }

    /// Liveness probe that pulls the cancel handle after confirming a set
    /// number of hosts
    struct CancellingLiveness {
        alive: HashSet<u8>,
        cancel_after: usize,
        confirmed: AtomicUsize,
        handle: Mutex<Option<CancelHandle>>,
    }

    impl LivenessProbe for CancellingLiveness {
        async fn arp_table(&self) -> Vec<(Ipv4Addr, String)> {
            Vec::new()
        }

        async fn is_alive(&self, ip: Ipv4Addr, _deadline: Duration) -> bool {
            let alive = self.alive.contains(&ip.octets()[3]);
            if alive && self.confirmed.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_after {
                if let Some(handle) = self.handle.lock().unwrap().take() {
                    handle.cancel();
                }
            }
            alive
        }
    }

    /// Probe that pulls the cancel handle on the first probe of one host
    struct TrippingProbe {
        open: HashMap<u8, Vec<u16>>,
        trip_octet: u8,
        handle: Mutex<Option<CancelHandle>>,
    }

    impl Probe for TrippingProbe {
        async fn probe(&self, ip: Ipv4Addr, port: u16, _deadline: Duration) -> ProbeOutcome {
            if ip.octets()[3] == self.trip_octet {
                if let Some(handle) = self.handle.lock().unwrap().take() {
                    handle.cancel();
                }
            }
            tokio::task::yield_now().await;
            match self.open.get(&ip.octets()[3]) {
                Some(ports) if ports.contains(&port) => ProbeOutcome::Open { rtt_ms: 1 },
                _ => ProbeOutcome::Refused,
            }
        }
    }

    fn orchestrator(net: FakeNet) -> ScanOrchestrator<FakeLiveness, FakeProbe> {
        orchestrator_counted(net).0
    }

    fn orchestrator_counted(
        net: FakeNet,
    ) -> (ScanOrchestrator<FakeLiveness, FakeProbe>, Arc<AtomicUsize>) {
        let liveness = FakeLiveness {
            alive: net.hosts.keys().copied().collect(),
            arp: net.arp,
        };
        let issued = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            open: net.hosts,
            issued: issued.clone(),
        };
        (
            ScanOrchestrator::new(HostDiscoverer::new(liveness), PortScanner::new(probe)),
            issued,
        )
    }

    fn subnet() -> Subnet {
        Subnet::parse("192.168.1").unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_quick_scan_scenario() {
        let net = FakeNet {
            hosts: HashMap::from([(10, vec![22, 80])]),
            arp: vec![(
                Ipv4Addr::new(192, 168, 1, 10),
                String::from("B8:27:EB:01:02:03"),
            )],
        };
        let mut orchestrator = orchestrator(net);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = orchestrator
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();

        let report = outcome.into_report();
        assert_eq!(report.inventory.len(), 1);
        let device = report.inventory.get(Ipv4Addr::new(192, 168, 1, 10)).unwrap();
        assert_eq!(device.open_port_numbers(), vec![22, 80]);
        assert!(device.open_ports.iter().all(|p| p.state == PortState::Open));
        assert_eq!(device.device_type, DeviceType::Unknown);
        assert!(device.is_online);
        assert_eq!(
            device.manufacturer.as_deref(),
            Some("Raspberry Pi Foundation")
        );
        assert_eq!(report.reputations.len(), 1);
        assert_eq!(orchestrator.state(), ScanState::Complete);

        // Event stream: states in order, progress monotone, device streamed
        let events = drain(&mut rx);
        let states: Vec<ScanState> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ScanState::Discovering,
                ScanState::Scanning,
                ScanState::Classifying,
                ScanState::Scoring,
                ScanState::Complete,
            ]
        );
        let mut last = 0.0f64;
        let mut saw_device = false;
        for event in &events {
            match event {
                ScanEvent::Progress { fraction, .. } => {
                    assert!(*fraction >= last - 1e-9, "progress went backwards");
                    assert!((0.0..=1.0).contains(fraction));
                    last = *fraction;
                }
                ScanEvent::DeviceFound(d) => {
                    saw_device = true;
                    assert_eq!(d.ip_address, Ipv4Addr::new(192, 168, 1, 10));
                }
                ScanEvent::StateChanged(_) => {}
            }
        }
        assert!((last - 1.0).abs() < 1e-9);
        assert!(saw_device);
    }

    #[tokio::test]
    async fn test_cancellation_yields_partial_inventory() {
        let net = FakeNet {
            hosts: HashMap::from([(1, vec![80]), (2, vec![80]), (3, vec![80])]),
            arp: Vec::new(),
        };
        let (mut orchestrator, issued) = orchestrator_counted(net);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (handle, token) = cancel_pair();

        // Cancel lands after discovery, before scanning issues any probes
        handle.cancel();
        let outcome = orchestrator
            .run(&subnet(), ScanMode::Quick, tx, token)
            .await
            .unwrap();

        assert!(outcome.was_cancelled());
        assert!(outcome.report().reputations.is_empty());
        assert_eq!(orchestrator.state(), ScanState::Cancelled);
        assert_eq!(
            issued.load(Ordering::SeqCst),
            0,
            "cancelled scan must not issue port probes"
        );
    }

    #[tokio::test]
    async fn test_cancel_during_discovery_keeps_found_hosts() {
        let (handle, token) = cancel_pair();
        // Serial probing, cancel lands right after the third confirmation
        let liveness = CancellingLiveness {
            alive: [1u8, 2, 3].into_iter().collect(),
            cancel_after: 3,
            confirmed: AtomicUsize::new(0),
            handle: Mutex::new(Some(handle)),
        };
        let discoverer = HostDiscoverer::with_config(
            liveness,
            DiscoveryConfig {
                concurrency: 1,
                ..DiscoveryConfig::default()
            },
        );
        let probe = FakeProbe {
            open: HashMap::new(),
            issued: Arc::new(AtomicUsize::new(0)),
        };
        let mut orch = ScanOrchestrator::new(discoverer, PortScanner::new(probe));
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, token)
            .await
            .unwrap();

        assert!(outcome.was_cancelled());
        let report = outcome.report();
        let octets: Vec<u8> = report
            .inventory
            .iter()
            .map(|d| d.ip_address.octets()[3])
            .collect();
        assert_eq!(octets, vec![1, 2, 3], "discovered hosts discarded on cancel");
        assert!(report.inventory.iter().all(|d| d.open_ports.is_empty()));
        assert_eq!(orch.state(), ScanState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_scanning_keeps_completed_ports() {
        let (handle, token) = cancel_pair();
        let liveness = FakeLiveness {
            alive: [10u8, 20, 30].into_iter().collect(),
            arp: Vec::new(),
        };
        // Host .10 scans clean; the first probe of .20 pulls the handle,
        // so .30 is never scanned
        let probe = TrippingProbe {
            open: HashMap::from([(10, vec![80]), (30, vec![22])]),
            trip_octet: 20,
            handle: Mutex::new(Some(handle)),
        };
        let mut orch = ScanOrchestrator::new(HostDiscoverer::new(liveness), PortScanner::new(probe))
            .with_host_concurrency(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, token)
            .await
            .unwrap();

        assert!(outcome.was_cancelled());
        let report = outcome.report();
        let octets: Vec<u8> = report
            .inventory
            .iter()
            .map(|d| d.ip_address.octets()[3])
            .collect();
        assert_eq!(octets, vec![10, 20, 30]);

        let scanned = report.inventory.get(Ipv4Addr::new(192, 168, 1, 10)).unwrap();
        assert_eq!(scanned.open_port_numbers(), vec![80]);
        let unscanned = report.inventory.get(Ipv4Addr::new(192, 168, 1, 30)).unwrap();
        assert!(unscanned.open_ports.is_empty());
        assert!(report.reputations.is_empty());
    }

    #[tokio::test]
    async fn test_rogue_detection_and_allowlist_flip() {
        let mac = "AA:BB:CC:DD:EE:01";
        let net = |arp_mac: &str| FakeNet {
            hosts: HashMap::from([(40, vec![80])]),
            arp: vec![(Ipv4Addr::new(192, 168, 1, 40), String::from(arp_mac))],
        };
        let (tx, _rx) = mpsc::unbounded_channel();

        // Fresh device, no allowlist: rogue
        let mut orch = orchestrator(net(mac));
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx.clone(), CancelToken::never())
            .await
            .unwrap();
        let device = outcome.report().inventory.get(Ipv4Addr::new(192, 168, 1, 40)).unwrap();
        assert!(device.is_rogue);
        assert!(!device.is_known_device);

        // Same device allowlisted: known, not rogue, named
        let mut orch = orchestrator(net(mac))
            .with_allowlist(HashMap::from([(String::from(mac), String::from("NAS"))]));
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();
        let device = outcome.report().inventory.get(Ipv4Addr::new(192, 168, 1, 40)).unwrap();
        assert!(!device.is_rogue);
        assert!(device.is_known_device);
        assert_eq!(device.hostname.as_deref(), Some("NAS"));
    }

    #[tokio::test]
    async fn test_old_device_is_not_rogue() {
        let mac = "AA:BB:CC:DD:EE:02";
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        let mut previous = DeviceInventory::new();
        let mut old = Device::new(ip).with_mac(mac);
        old.first_seen = Utc::now() - chrono::Duration::days(90);
        previous.upsert(old);

        let net = FakeNet {
            hosts: HashMap::from([(50, vec![80])]),
            arp: vec![(ip, String::from(mac))],
        };
        let mut orch = orchestrator(net).with_previous_inventory(previous);
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();

        let device = outcome.report().inventory.get(ip).unwrap();
        assert!(!device.is_rogue, "long-known device flagged rogue");
        assert!(device.first_seen < Utc::now() - chrono::Duration::days(89));
    }

    #[tokio::test]
    async fn test_vanished_device_carried_offline() {
        let gone_ip = Ipv4Addr::new(192, 168, 1, 99);
        let mut previous = DeviceInventory::new();
        previous.upsert(Device::new(gone_ip).with_mac("AA:BB:CC:DD:EE:99"));

        let net = FakeNet {
            hosts: HashMap::from([(10, vec![443])]),
            arp: Vec::new(),
        };
        let mut orch = orchestrator(net).with_previous_inventory(previous);
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();

        let report = outcome.report();
        assert_eq!(report.inventory.len(), 2);
        let gone = report.inventory.get(gone_ip).unwrap();
        assert!(!gone.is_online);

        // Offline observation recorded, and the offline penalty applied
        let record = orch.uptime_tracker().get("AA:BB:CC:DD:EE:99").unwrap();
        assert_eq!(record.observation_count(), 1);
        assert_eq!(record.uptime_percentage(), 0.0);
        let reputation = &report.reputations["AA:BB:CC:DD:EE:99"];
        assert!(reputation
            .factors
            .iter()
            .any(|f| f.category == "Availability" && f.impact == -10));
    }

    #[tokio::test]
    async fn test_inventory_sorted_by_ip() {
        let net = FakeNet {
            hosts: HashMap::from([(200, vec![80]), (3, vec![80]), (42, vec![80])]),
            arp: Vec::new(),
        };
        let mut orch = orchestrator(net);
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();

        let octets: Vec<u8> = outcome
            .report()
            .inventory
            .iter()
            .map(|d| d.ip_address.octets()[3])
            .collect();
        assert_eq!(octets, vec![3, 42, 200]);
    }

    #[tokio::test]
    async fn test_start_scan_handle() {
        let net = FakeNet {
            hosts: HashMap::from([(10, vec![22])]),
            arp: Vec::new(),
        };
        let handle = orchestrator(net).start_scan(subnet(), ScanMode::Quick);
        let outcome = handle.join().await.unwrap();
        assert!(!outcome.was_cancelled());
        assert_eq!(outcome.report().inventory.len(), 1);
    }

    #[tokio::test]
    async fn test_classification_from_banners() {
        // Server-shaped host: database port drives the type, banner the OS
        let net = FakeNet {
            hosts: HashMap::from([(20, vec![22, 3306])]),
            arp: Vec::new(),
        };
        let mut orch = orchestrator(net);
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = orch
            .run(&subnet(), ScanMode::Quick, tx, CancelToken::never())
            .await
            .unwrap();

        let device = outcome
            .report()
            .inventory
            .get(Ipv4Addr::new(192, 168, 1, 20))
            .unwrap();
        assert_eq!(device.device_type, DeviceType::Server);
        // No banner grabber injected: services still labeled from port numbers
        let ssh = device.open_ports.iter().find(|p| p.port == 22).unwrap();
        assert_eq!(ssh.service, "ssh");
        let mysql = device.open_ports.iter().find(|p| p.port == 3306).unwrap();
        assert_eq!(mysql.service, "mysql");
    }
}
