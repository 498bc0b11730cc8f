//! Command-line interface.
//!
//! Validates targets and ports up front, runs the scan, and streams results
//! to stdout while listening for Ctrl-C. All validation failures surface
//! before any probe is submitted.

use crate::output::{self, ReportWriter};
use crate::scanner::{ScanConfig, Scanner};
use crate::types::{self, PortSpec};
use anyhow::{bail, Context};
use clap::Parser;
use ipnetwork::IpNetwork;
use std::time::{Duration, Instant};

/// Probe TCP ports for reachability.
///
/// Targets are hosts (addresses or names) and/or CIDR networks; every
/// (host, port) pair is classified as open, closed, timeout, or unknown.
#[derive(Parser, Debug)]
#[command(name = "portreach")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An asynchronous TCP port reachability prober", long_about = None)]
#[command(group = clap::ArgGroup::new("targets").required(true).multiple(true).args(["hosts", "nets"]))]
pub struct Cli {
    /// Host addresses or names to scan
    #[arg(short = 'H', long = "host", value_name = "HOST", num_args = 1..,
          value_parser = types::parse_host)]
    pub hosts: Vec<String>,

    /// Networks to scan, in CIDR notation
    #[arg(short = 'N', long = "net", value_name = "CIDR", num_args = 1..,
          value_parser = types::parse_net)]
    pub nets: Vec<IpNetwork>,

    /// Ports to probe: numbers and low-high ranges (e.g. "22 80,443 8000-8100")
    #[arg(short, long, value_name = "PORTS", required = true, num_args = 1..)]
    pub ports: Vec<String>,

    /// Per-phase timeout in seconds
    #[arg(short, long, default_value = "3.0", value_name = "SECS")]
    pub timeout: f64,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "100", value_name = "N")]
    pub workers: usize,

    /// Retrieve a banner from services on open ports
    #[arg(short, long)]
    pub banner: bool,

    /// Banner read buffer size in bytes
    #[arg(long, default_value = "1024", value_name = "BYTES")]
    pub buffer_size: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Show every outcome instead of open ports only
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable aligned columns
    Plain,
    /// CSV rows for data analysis
    Csv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Plain
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Execute a scan run described by the parsed arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let spec: PortSpec = cli
        .ports
        .join(" ")
        .parse()
        .context("invalid port specification")?;
    let ports = spec.to_ports();

    if !(cli.timeout > 0.0) {
        bail!("timeout must be greater than zero");
    }

    let config = ScanConfig::new()
        .with_workers(cli.workers)
        .with_timeout(Duration::from_secs_f64(cli.timeout))
        .with_buffer_size(cli.buffer_size);
    let config = if cli.banner {
        config.with_banner()
    } else {
        config
    };

    let mut scanner = Scanner::new(config)?;
    for host in &cli.hosts {
        scanner.check_host(host, &ports);
    }
    for net in &cli.nets {
        scanner.check_net(*net, &ports);
    }

    let mut stream = scanner
        .results()
        .context("result stream already consumed")?;
    let mut writer = ReportWriter::new(cli.output, cli.verbose)?;

    let start = Instant::now();
    let mut total = 0usize;
    let mut open = 0usize;
    let mut interrupted = false;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("failed to listen for interrupt")?;
                eprintln!();
                output::print_warning("interrupted, cancelling in-flight probes");
                scanner.cancel();
                interrupted = true;
            }
            report = stream.recv() => match report {
                Some(report) => {
                    total += 1;
                    if report.is_open() {
                        open += 1;
                    }
                    writer.write(&report)?;
                }
                None => break,
            }
        }
    }
    writer.finish()?;

    if cli.output == OutputFormat::Plain {
        if interrupted {
            output::print_warning("scan interrupted, partial results shown");
        }
        output::print_info(&format!(
            "{} probes completed, {} open, in {:.3}s",
            total,
            open,
            start.elapsed().as_secs_f64()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_asserts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_requires_a_target() {
        assert!(Cli::try_parse_from(["portreach", "-p", "80"]).is_err());
    }

    #[test]
    fn test_parses_hosts_and_nets() {
        let cli = Cli::try_parse_from([
            "portreach",
            "-H",
            "192.168.1.1",
            "example.com",
            "-N",
            "10.0.0.0/30",
            "-p",
            "22-25",
            "80",
        ])
        .unwrap();
        assert_eq!(cli.hosts.len(), 2);
        assert_eq!(cli.nets.len(), 1);
        assert_eq!(cli.ports.len(), 2);
        assert!(!cli.banner);
        assert_eq!(cli.workers, 100);
    }

    #[test]
    fn test_rejects_invalid_targets() {
        assert!(Cli::try_parse_from(["portreach", "-H", "bad host", "-p", "80"]).is_err());
        assert!(Cli::try_parse_from(["portreach", "-N", "10.0.0.0/8", "-p", "80"]).is_err());
    }
}
