//! `fanout`: run a JSON manifest of HTTP requests as one concurrent batch.
//!
//! ```text
//! manifest.json
//!     → manifest (requests → statements)
//!     → Kernel::execute over ReqwestTransport
//!     → JSON report on stdout, one entry per request in manifest order
//! ```
//!
//! Logs go to stderr. Exit status is non-zero when the batch itself fails,
//! or when `--no-catch` is given and any request failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fanout::config::{load_config, KernelConfig};
use fanout::hooks::{Dispatcher, LoggingSubscriber};
use fanout::kernel::Kernel;
use fanout::manifest::{BatchManifest, BatchReport};
use fanout::observability::init_logging;
use fanout::transport::ReqwestTransport;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Execute a batch of HTTP requests concurrently", long_about = None)]
struct Cli {
    /// Kernel configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report failed requests as errors instead of 500 responses
    #[arg(long)]
    no_catch: bool,

    /// Batch manifest (JSON)
    manifest: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fanout failed");
            eprintln!("fanout: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KernelConfig::default(),
    };
    init_logging(&config.observability);

    tracing::info!(
        manifest = %cli.manifest.display(),
        max_in_flight = config.transport.max_in_flight,
        "fanout v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let mut statements = BatchManifest::load(&cli.manifest)?.into_statements()?;

    let mut bus = Dispatcher::new();
    if config.observability.log_events {
        bus.subscribe(LoggingSubscriber);
    }

    let kernel = Kernel::new(ReqwestTransport::new(config.transport.clone()), bus).with_options(config.batch.clone());
    kernel.execute(&mut statements).await?;

    let catch = !cli.no_catch;
    let report = BatchReport::from_statements(&statements, catch);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failures = report.failures();
    tracing::info!(requests = statements.len(), failures, "Batch finished");
    if failures > 0 && !catch {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
