//! Banner grabbing - protocol-specific probes to elicit service banners
//!
//! SSH, FTP, POP3, IMAP, Telnet, and MySQL announce themselves on connect, so
//! they get a plain read. HTTP ports get a GET request, SMTP ports a greeting
//! read followed by EHLO. Everything else falls back to read-then-CRLF. An
//! absent or unreadable banner is a normal outcome, never an error.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Probe strategy per port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeKind {
    /// Wait for the service to announce itself
    Null,
    /// HTTP GET request
    HttpGet,
    /// Read greeting, send EHLO, read response
    SmtpEhlo,
    /// Read first; if silent, nudge with CRLF and read again
    Generic,
}

fn probe_for_port(port: u16) -> ProbeKind {
    match port {
        21 | 22 | 23 | 110 | 143 | 993 | 995 | 3306 => ProbeKind::Null,
        80 | 443 | 8000 | 8080 | 8443 | 8888 => ProbeKind::HttpGet,
        25 | 465 | 587 => ProbeKind::SmtpEhlo,
        _ => ProbeKind::Generic,
    }
}

/// Banner grabber with protocol-specific probes
#[derive(Debug, Clone)]
pub struct BannerGrabber {
    connect_timeout: Duration,
    read_timeout: Duration,
    max_banner_size: usize,
}

impl Default for BannerGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl BannerGrabber {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            max_banner_size: 4096,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Grab a banner from an open port. `None` means no parseable banner -
    /// the port still gets a generic service label downstream.
    pub async fn grab(&self, target: Ipv4Addr, port: u16) -> Option<String> {
        let addr = SocketAddr::new(IpAddr::V4(target), port);

        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                trace!("Banner connect to {} failed: {}", addr, e);
                return None;
            }
            Err(_) => {
                trace!("Banner connect to {} timed out", addr);
                return None;
            }
        };

        let raw = match probe_for_port(port) {
            ProbeKind::Null => self.read_once(stream).await,
            ProbeKind::HttpGet => self.http_probe(stream).await,
            ProbeKind::SmtpEhlo => self.smtp_probe(stream).await,
            ProbeKind::Generic => self.generic_probe(stream).await,
        }?;

        let text = String::from_utf8_lossy(&raw)
            .replace('\0', "")
            .trim()
            .to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn read_once(&self, mut stream: TcpStream) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; self.max_banner_size];
        match timeout(self.read_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) if n > 0 => {
                buffer.truncate(n);
                Some(buffer)
            }
            _ => None,
        }
    }

    async fn http_probe(&self, mut stream: TcpStream) -> Option<Vec<u8>> {
        let request = "GET / HTTP/1.0\r\nHost: target\r\nUser-Agent: LanWarden/0.3\r\n\r\n";
        if stream.write_all(request.as_bytes()).await.is_err() {
            return None;
        }
        self.read_once(stream).await
    }

    async fn smtp_probe(&self, mut stream: TcpStream) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; self.max_banner_size];
        let mut response = Vec::new();

        // Greeting first
        if let Ok(Ok(n)) = timeout(self.read_timeout, stream.read(&mut buffer)).await {
            response.extend_from_slice(&buffer[..n]);
        }

        if stream.write_all(b"EHLO lanwarden.local\r\n").await.is_ok() {
            if let Ok(Ok(n)) = timeout(self.read_timeout, stream.read(&mut buffer)).await {
                response.extend_from_slice(&buffer[..n]);
            }
        }
        let _ = stream.write_all(b"QUIT\r\n").await;

        if response.is_empty() {
            None
        } else {
            Some(response)
        }
    }

    async fn generic_probe(&self, mut stream: TcpStream) -> Option<Vec<u8>> {
        let mut buffer = vec![0u8; self.max_banner_size];

        // Many services announce unprompted
        if let Ok(Ok(n)) = timeout(self.read_timeout, stream.read(&mut buffer)).await {
            if n > 0 {
                buffer.truncate(n);
                return Some(buffer);
            }
        }

        if stream.write_all(b"\r\n").await.is_err() {
            return None;
        }
        match timeout(self.read_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) if n > 0 => {
                buffer.truncate(n);
                Some(buffer)
            }
            _ => None,
        }
    }
}
