//! Scan orchestration: fan-out of hosts and networks into pooled probes.
//!
//! A [`Scanner`] owns one run: a worker pool bounding concurrent probes, a
//! shared [`Prober`], and the result channel. Network targets expand
//! recursively through the pool itself - a network submission becomes pooled
//! per-host expansions, which become pooled per-port probes - with every
//! child registered before its parent finishes, so the pool's drain signal
//! only fires once the whole tree has produced its reports.

use crate::error::ConfigError;
use crate::pool::WorkPool;
use crate::probe::{Prober, DEFAULT_BUFFER_SIZE};
use crate::results::{self, ResultSink, ResultStream};
use crate::types::{host_count, Port};
use ipnetwork::IpNetwork;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for a scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum number of concurrently in-flight work items.
    pub workers: usize,
    /// Per-phase timeout shared by the connect and banner phases.
    pub timeout: Duration,
    /// Whether to attempt banner capture on open ports.
    pub banner: bool,
    /// Banner read buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 100,
            timeout: Duration::from_secs(3),
            banner: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ScanConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker capacity.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-phase timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable banner capture.
    pub fn with_banner(mut self) -> Self {
        self.banner = true;
        self
    }

    /// Set the banner buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

struct ScannerInner {
    pool: WorkPool,
    prober: Prober,
    sink: ResultSink,
    cancel: CancellationToken,
}

impl ScannerInner {
    /// Register one probe per port, then admit them from a detached loop.
    ///
    /// The registration happens before this returns, so a pooled caller (a
    /// network expansion item) cannot complete with its children uncounted.
    fn spawn_host_scan(self: &Arc<Self>, host: String, ports: Arc<[Port]>) {
        let mut batch = self.pool.reserve(ports.len());
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            for &port in ports.iter() {
                if inner.cancel.is_cancelled() {
                    break;
                }
                let task = inner.probe_task(host.clone(), port);
                if batch.submit(task).await.is_err() {
                    break;
                }
            }
        });
    }

    /// One pooled unit of work: probe a single (host, port) pair and push
    /// its report, unless the run is cancelled first.
    fn probe_task(
        self: &Arc<Self>,
        host: String,
        port: Port,
    ) -> impl Future<Output = ()> + Send + 'static {
        let inner = Arc::clone(self);
        async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                report = inner.prober.probe(&host, port) => inner.sink.push(report),
            }
        }
    }
}

/// An asynchronous port scanner over a single run.
///
/// Submit targets with [`check_host`](Scanner::check_host) and
/// [`check_net`](Scanner::check_net), then take the [`ResultStream`] and
/// drain it; the stream terminates once every submitted probe has reported.
pub struct Scanner {
    inner: Arc<ScannerInner>,
    stream: Option<ResultStream>,
    // Holds one registered-but-never-admitted pool slot for the submission
    // phase. While it lives, the pool cannot drain between two top-level
    // check_* calls; results() releases it.
    guard: Option<crate::pool::Reservation>,
}

impl Scanner {
    /// Create a scanner for one run.
    ///
    /// Rejects non-positive timeouts, a zero banner buffer, and zero worker
    /// capacity before any work can be submitted.
    pub fn new(config: ScanConfig) -> Result<Self, ConfigError> {
        if config.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if config.buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }

        let (sink, stream) = results::channel();
        let drain_sink = sink.clone();
        let pool = WorkPool::with_drain_callback(config.workers, move || drain_sink.close())?;
        let guard = pool.reserve(1);

        let prober = Prober::new(config.timeout, config.banner, config.buffer_size);
        Ok(Self {
            inner: Arc::new(ScannerInner {
                pool,
                prober,
                sink,
                cancel: CancellationToken::new(),
            }),
            stream: Some(stream),
            guard: Some(guard),
        })
    }

    /// Queue a probe of every port against one host.
    ///
    /// Returns immediately; the probes are admitted by the pool as permits
    /// free up. The host may be an address or a name (resolved per probe).
    pub fn check_host(&self, host: &str, ports: &[Port]) {
        debug!(%host, ports = ports.len(), "queueing host scan");
        self.inner
            .spawn_host_scan(host.to_string(), Arc::from(ports));
    }

    /// Queue a probe of every port against every address in a network.
    ///
    /// Each per-host expansion is itself a pooled work item, so even the
    /// expansion step respects the worker capacity. Every address in the
    /// network is scanned, including the network and broadcast addresses.
    pub fn check_net(&self, network: IpNetwork, ports: &[Port]) {
        let hosts = host_count(&network) as usize;
        debug!(%network, hosts, ports = ports.len(), "queueing network scan");

        let ports: Arc<[Port]> = Arc::from(ports);
        let mut batch = self.inner.pool.reserve(hosts);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            for host in network.iter() {
                if inner.cancel.is_cancelled() {
                    break;
                }
                let expansion = {
                    let inner = Arc::clone(&inner);
                    let ports = Arc::clone(&ports);
                    async move {
                        inner.spawn_host_scan(host.to_string(), ports);
                    }
                };
                if batch.submit(expansion).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Take the result stream, ending the submission phase.
    ///
    /// From this point the run is considered fully described: once every
    /// queued probe has reported, the stream terminates. Returns `None` if
    /// the stream was already taken.
    pub fn results(&mut self) -> Option<ResultStream> {
        self.guard.take();
        self.stream.take()
    }

    /// Wait for all work known to the pool at this moment.
    pub async fn join(&self) {
        self.inner.pool.join().await;
    }

    /// Cancel the run: stop admitting work, cancel in-flight probes, and
    /// close the result channel so a consumer loop terminates promptly.
    pub fn cancel(&self) {
        debug!("cancelling scan run");
        self.inner.cancel.cancel();
        self.inner.pool.close();
        self.inner.sink.close();
    }
}
