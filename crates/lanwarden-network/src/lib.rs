//! LanWarden Network - the concurrent scanning engine
//!
//! This crate provides the core network capabilities:
//! - Port probing (TCP connect with bounded timeout)
//! - Host discovery (ARP table, known devices, common ranges, full sweep)
//! - Port scanning (semaphore-bounded concurrent probes)
//! - Banner grabbing (protocol-specific probes)
//! - Service and device classification (banner regexes, port rule table, OUI)

pub mod banner;
pub mod cancel;
pub mod classify;
pub mod discovery;
pub mod port_scan;
pub mod probe;

pub use banner::BannerGrabber;
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use classify::{
    classify_device_type, manufacturer_for_mac, refine_with_manufacturer, ServiceClassifier,
    ServiceInfo,
};
pub use discovery::{
    DiscoveryConfig, DiscoveryPhase, DiscoveryProgress, DiscoveryReport, HostDiscoverer,
    LivenessProbe, TcpLivenessProbe,
};
pub use port_scan::{PortScanConfig, PortScanner};
pub use probe::{Probe, ProbeOutcome, TcpProbe};
