//! Concurrent port scanning against a single host
//!
//! Each port probe is independent and runs concurrently up to a configured
//! fan-out limit; the bounded semaphore prevents socket exhaustion on large
//! working sets. A port with no terminal connection state before its timeout
//! is reported filtered, never retried. Results are returned in ascending
//! port order regardless of completion order.

use crate::cancel::CancelToken;
use crate::probe::{Probe, ProbeOutcome};
use lanwarden_core::PortInfo;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Port scanner configuration
#[derive(Debug, Clone)]
pub struct PortScanConfig {
    /// Timeout per port probe
    pub timeout: Duration,
    /// Maximum concurrent probes per host
    pub concurrency: usize,
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1500),
            concurrency: 100,
        }
    }
}

/// Port scanner engine, generic over the probe capability
pub struct PortScanner<P: Probe> {
    config: PortScanConfig,
    probe: Arc<P>,
}

impl<P: Probe> PortScanner<P> {
    pub fn new(probe: P) -> Self {
        Self {
            config: PortScanConfig::default(),
            probe: Arc::new(probe),
        }
    }

    pub fn with_config(probe: P, config: PortScanConfig) -> Self {
        Self {
            config,
            probe: Arc::new(probe),
        }
    }

    /// Scan a port set, returning one `PortInfo` per issued probe in
    /// ascending port order. Honors the cancel token by not issuing further
    /// probes; ports never issued are absent from the result.
    pub async fn scan_ports(
        &self,
        target: Ipv4Addr,
        ports: &[u16],
        cancel: &CancelToken,
    ) -> Vec<PortInfo> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(ports.len());

        for &port in ports {
            // Permit acquisition bounds issuance; the cancel check sits after
            // it so a cancelled scan drains instead of queueing more work.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if cancel.is_cancelled() {
                debug!("Port scan of {} cancelled at port {}", target, port);
                break;
            }

            let probe = self.probe.clone();
            let deadline = self.config.timeout;

            let handle = tokio::spawn(async move {
                let outcome = probe.probe(target, port, deadline).await;
                drop(permit);
                (port, outcome)
            });
            handles.push(handle);
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok((port, outcome)) = handle.await {
                results.push(port_info_from(port, outcome));
            }
        }

        results.sort_by_key(|r| r.port);
        results
    }

    /// Scan and return only the open ports
    pub async fn scan_open_ports(
        &self,
        target: Ipv4Addr,
        ports: &[u16],
        cancel: &CancelToken,
    ) -> Vec<PortInfo> {
        self.scan_ports(target, ports, cancel)
            .await
            .into_iter()
            .filter(|r| r.is_open())
            .collect()
    }
}

fn port_info_from(port: u16, outcome: ProbeOutcome) -> PortInfo {
    match outcome {
        ProbeOutcome::Open { .. } => PortInfo::open(port),
        ProbeOutcome::Refused => PortInfo::closed(port),
        ProbeOutcome::TimedOut | ProbeOutcome::Unreachable => PortInfo::filtered(port),
    }
}
