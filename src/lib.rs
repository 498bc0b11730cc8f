//! # Portreach - An Asynchronous TCP Port Reachability Prober
//!
//! Portreach determines, for each (host, port) pair it is given, whether the
//! port is open, closed, or unresponsive, optionally capturing a service
//! banner. It is built around a bounded-concurrency execution engine: a
//! worker pool caps in-flight connections while accepting an effectively
//! unbounded stream of scan tasks, including tasks scheduled recursively by
//! network expansion.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portreach::{ScanConfig, Scanner};
//! use portreach::types::Port;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScanConfig::new()
//!         .with_workers(50)
//!         .with_timeout(Duration::from_secs(1));
//!     let mut scanner = Scanner::new(config).unwrap();
//!
//!     let ports = [Port::new(22).unwrap(), Port::new(80).unwrap()];
//!     scanner.check_host("192.168.1.1", &ports);
//!
//!     let mut results = scanner.results().unwrap();
//!     while let Some(report) = results.recv().await {
//!         println!("{} {} {}", report.host, report.outcome, report.port);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`pool`] - bounded-concurrency worker pool over an unbounded task stream
//! - [`probe`] - the per-target scan state machine and outcome types
//! - [`results`] - streaming bridge from scan tasks to the consumer
//! - [`scanner`] - fan-out orchestration of hosts and networks
//! - [`types`] - validated port and target types
//! - [`error`] - error taxonomies
//! - [`cli`] / [`output`] - command-line front end and renderers

pub mod cli;
pub mod error;
pub mod output;
pub mod pool;
pub mod probe;
pub mod results;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ScanError};
pub use pool::{PoolError, Reservation, WorkPool};
pub use probe::{Prober, ScanOutcome, ScanReport};
pub use results::{ResultSink, ResultStream};
pub use scanner::{ScanConfig, Scanner};
pub use types::{Port, PortSpec};
