//! Single-port TCP connect probe - the leaf primitive of the engine
//!
//! A probe never returns an error for connectivity outcomes: refused, timed
//! out, and unreachable are ordinary result values (the scan folds them into
//! "not open" / "not online").

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Terminal outcome of a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Handshake completed within the timeout
    Open { rtt_ms: u64 },
    /// Connection actively refused (RST) - host is alive, port closed
    Refused,
    /// No terminal state before the deadline
    TimedOut,
    /// Network-level failure (no route, host unreachable)
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open { .. })
    }

    /// Whether the outcome proves a host exists at the address
    pub fn indicates_alive(&self) -> bool {
        matches!(self, ProbeOutcome::Open { .. } | ProbeOutcome::Refused)
    }
}

/// Connect-probe capability. The production implementation opens real TCP
/// connections; tests substitute scripted responders.
pub trait Probe: Send + Sync + 'static {
    fn probe(
        &self,
        ip: Ipv4Addr,
        port: u16,
        deadline: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Real TCP connect probe
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Probe for TcpProbe {
    async fn probe(&self, ip: Ipv4Addr, port: u16, deadline: Duration) -> ProbeOutcome {
        let addr = SocketAddr::new(IpAddr::V4(ip), port);
        let start = std::time::Instant::now();

        match timeout(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                let rtt_ms = start.elapsed().as_millis() as u64;
                trace!("{}:{} open ({} ms)", ip, port, rtt_ms);
                ProbeOutcome::Open { rtt_ms }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                trace!("{}:{} refused", ip, port);
                ProbeOutcome::Refused
            }
            Ok(Err(e)) => {
                trace!("{}:{} unreachable: {}", ip, port, e);
                ProbeOutcome::Unreachable
            }
            Err(_) => {
                trace!("{}:{} timed out", ip, port);
                ProbeOutcome::TimedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_open_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = TcpProbe::new()
            .probe(Ipv4Addr::LOCALHOST, port, Duration::from_secs(1))
            .await;
        assert!(outcome.is_open());
        assert!(outcome.indicates_alive());
    }

    #[tokio::test]
    async fn test_probe_refused_on_unbound_port() {
        // Bind then drop to get a port that is very likely unbound
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = TcpProbe::new()
            .probe(Ipv4Addr::LOCALHOST, port, Duration::from_secs(1))
            .await;
        assert_eq!(outcome, ProbeOutcome::Refused);
        assert!(outcome.indicates_alive());
        assert!(!outcome.is_open());
    }
}
