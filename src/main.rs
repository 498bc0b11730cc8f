//! Binary entry point: logging bootstrap, argument parsing, exit code.

use clap::Parser;
use portreach::cli::{self, Cli};
use portreach::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // logs go to stderr so stdout stays clean for result rows
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
