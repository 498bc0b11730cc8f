//! Output formatting for the result stream.
//!
//! Renders each report as `host, outcome, port, banner` in plain text or
//! CSV, streamed row by row as results arrive rather than buffered until
//! the end of the run.

use crate::cli::OutputFormat;
use crate::probe::{ScanOutcome, ScanReport};
use console::{style, Style};
use std::io::{self, Write};

/// Streaming renderer over stdout for one scan run.
pub struct ReportWriter {
    format: OutputFormat,
    show_all: bool,
    csv: Option<csv::Writer<io::Stdout>>,
}

impl ReportWriter {
    /// Create a writer; in CSV mode the header row is emitted immediately.
    pub fn new(format: OutputFormat, show_all: bool) -> io::Result<Self> {
        let csv = match format {
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(io::stdout());
                writer
                    .write_record(["host", "outcome", "port", "banner"])
                    .map_err(csv_io_err)?;
                writer.flush()?;
                Some(writer)
            }
            OutputFormat::Plain => None,
        };
        Ok(Self {
            format,
            show_all,
            csv,
        })
    }

    /// Render one report, honoring the open-only filter.
    pub fn write(&mut self, report: &ScanReport) -> io::Result<()> {
        if !self.show_all && report.outcome != ScanOutcome::Open {
            return Ok(());
        }

        match self.format {
            OutputFormat::Plain => print_row(report),
            OutputFormat::Csv => {
                if let Some(writer) = self.csv.as_mut() {
                    writer
                        .write_record([
                            report.host.as_str(),
                            &report.outcome.to_string(),
                            &report.port.to_string(),
                            report.banner.as_deref().unwrap_or(""),
                        ])
                        .map_err(csv_io_err)?;
                    writer.flush()?;
                }
                Ok(())
            }
        }
    }

    /// Flush any buffered output.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.csv.as_mut() {
            Some(writer) => writer.flush(),
            None => io::stdout().flush(),
        }
    }
}

/// Print one plain-text row: host, outcome, port, banner.
fn print_row(report: &ScanReport) -> io::Result<()> {
    let outcome_style = match report.outcome {
        ScanOutcome::Open => Style::new().green().bold(),
        ScanOutcome::Closed => Style::new().red(),
        ScanOutcome::Timeout => Style::new().yellow(),
        ScanOutcome::Unknown => Style::new().dim(),
    };

    // pad before styling so ANSI codes don't break the column widths
    let outcome = format!("{:<8}", report.outcome);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{:<16} {} {:<6} {}",
        report.host,
        outcome_style.apply_to(outcome),
        report.port,
        style(report.banner.as_deref().unwrap_or("")).dim()
    )
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message to stderr.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an informational message to stderr, keeping stdout clean for rows.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("•").dim(), msg);
}

fn csv_io_err(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Port;

    #[test]
    fn test_open_only_filter() {
        let mut writer = ReportWriter::new(OutputFormat::Plain, false).unwrap();
        let closed = ScanReport::new(
            "127.0.0.1",
            Port::new_unchecked(81),
            ScanOutcome::Closed,
            None,
        );
        // filtered rows must not error either
        assert!(writer.write(&closed).is_ok());
        assert!(writer.finish().is_ok());
    }
}
