//! Per-target scan state machine.
//!
//! A probe walks resolve -> connect-with-timeout -> optional banner read and
//! classifies the result as one of four outcomes. Every failure path is
//! absorbed into the outcome; [`Prober::probe`] always returns a well-formed
//! [`ScanReport`].

use crate::error::ScanError;
use crate::types::Port;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Payload written before the banner read to coax a reply out of
/// text-based services.
const BANNER_PROBE: &[u8] = b"\r\n\r\n";

/// Default banner read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Final classification of a single port probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Connection was established.
    Open,
    /// Connection was actively refused or rejected by the OS.
    Closed,
    /// No response within the deadline.
    Timeout,
    /// Resolution failure or an unclassified error.
    Unknown,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of probing a single (host, port) pair.
///
/// Produced exactly once per scheduled probe, whatever happened.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// The target as it was submitted: an address or a name.
    pub host: String,
    /// The probed port.
    pub port: Port,
    /// Final classification.
    pub outcome: ScanOutcome,
    /// Banner captured from the service, if requested and received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl ScanReport {
    /// Create a new report.
    pub fn new(
        host: impl Into<String>,
        port: Port,
        outcome: ScanOutcome,
        banner: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            outcome,
            banner,
        }
    }

    /// Check if the port was reachable.
    pub fn is_open(&self) -> bool {
        self.outcome == ScanOutcome::Open
    }
}

/// TCP reachability prober.
///
/// Performs full connect() probes; no elevated privileges required. One
/// prober is shared by every scan task in a run, so the timeout, banner
/// setting, and resolver are uniform across the run.
pub struct Prober {
    timeout: Duration,
    grab_banner: bool,
    buffer_size: usize,
    resolver: TokioAsyncResolver,
}

impl Prober {
    /// Create a prober using the system's default resolver configuration.
    pub fn new(timeout: Duration, grab_banner: bool, buffer_size: usize) -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self::with_resolver(timeout, grab_banner, buffer_size, resolver)
    }

    /// Create a prober with an injected resolver.
    pub fn with_resolver(
        timeout: Duration,
        grab_banner: bool,
        buffer_size: usize,
        resolver: TokioAsyncResolver,
    ) -> Self {
        Self {
            timeout,
            grab_banner,
            buffer_size,
            resolver,
        }
    }

    /// The per-phase timeout shared by the connect and banner phases.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one (host, port) pair.
    ///
    /// Never fails: every error path is folded into the report's outcome.
    /// A banner-phase timeout or error leaves a proven-open port `open`.
    pub async fn probe(&self, host: &str, port: Port) -> ScanReport {
        match self.try_probe(host, port).await {
            Ok(banner) => ScanReport::new(host, port, ScanOutcome::Open, banner),
            Err(err) => {
                let outcome = err.outcome();
                match outcome {
                    ScanOutcome::Unknown => {
                        warn!(%host, %port, error = %err, "probe failed with unclassified error");
                    }
                    _ => {
                        debug!(%host, %port, %outcome, "probe did not connect");
                    }
                }
                ScanReport::new(host, port, outcome, None)
            }
        }
    }

    async fn try_probe(&self, host: &str, port: Port) -> Result<Option<String>, ScanError> {
        let addr = self.resolve(host).await?;
        let stream = self.connect(SocketAddr::new(addr, port.as_u16())).await?;
        // connectivity is proven from here on; nothing below may change the
        // outcome away from open
        if self.grab_banner {
            Ok(self.read_banner(stream).await)
        } else {
            Ok(None)
        }
    }

    /// Resolve a target to an address: numeric fast path, then DNS.
    async fn resolve(&self, host: &str) -> Result<IpAddr, ScanError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ScanError::Resolution {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        lookup
            .iter()
            .next()
            .ok_or_else(|| ScanError::NoAddresses(host.to_string()))
    }

    /// Attempt a TCP connection bounded by the configured timeout.
    async fn connect(&self, addr: SocketAddr) -> Result<TcpStream, ScanError> {
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::Rejected(e)),
            Err(_) => Err(ScanError::ConnectTimeout),
        }
    }

    /// Best-effort banner read from a freshly opened stream.
    ///
    /// Writes the probe payload, then reads up to the configured buffer size
    /// under the same timeout value as the connect phase. Any failure here
    /// just means no banner.
    async fn read_banner(&self, mut stream: TcpStream) -> Option<String> {
        if stream.write_all(BANNER_PROBE).await.is_err() {
            return None;
        }

        let mut buffer = vec![0u8; self.buffer_size];
        match timeout(self.timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) if n > 0 => Some(clean_banner(&buffer[..n])),
            _ => None,
        }
    }
}

/// Decode banner bytes permissively and strip line breaks.
fn clean_banner(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .filter(|&c| c != '\r' && c != '\n')
        .collect()
}
