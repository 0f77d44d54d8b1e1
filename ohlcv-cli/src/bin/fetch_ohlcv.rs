//! Fetch OHLCV history for every exchange, symbol and interval in a
//! configuration document.
//!
//! Exit codes: 0 on success, 1 if any exchange or task failed, 2 on
//! configuration errors.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ohlcv::{Fetcher, FetcherConfig, TaskOutcome};
use ohlcv_cli::{EXIT_CONFIG, connectors, init_logging};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "fetch-ohlcv",
    version,
    about = "Page historical OHLCV candles from crypto exchanges into CSV files"
)]
struct Cli {
    /// Path to the TOML (or `.json`) configuration document
    config: PathBuf,

    /// Log at debug level and trace connector requests (also `settings.debug`)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    let cfg = match FetcherConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_logging(cli.debug);
            error!(error = %e, "invalid configuration");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let debug = cli.debug || cfg.settings.debug;
    init_logging(debug);

    let fetcher = match connectors(debug)?
        .into_iter()
        .fold(Fetcher::builder(), |b, c| b.with_exchange(c))
        .config(cfg)
        .build()
    {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    info!(exchanges = ?fetcher.exchanges().collect::<Vec<_>>(), "starting fetch");
    let report = fetcher
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;

    for ex in &report.exchanges {
        if let Some(e) = &ex.error {
            error!(exchange = %ex.exchange, error = %e, "exchange failed");
        }
        for task in &ex.tasks {
            let outcome = match &task.outcome {
                TaskOutcome::Done => "done".to_string(),
                TaskOutcome::Cancelled => "cancelled".to_string(),
                TaskOutcome::Failed(e) => format!("failed: {e}"),
            };
            println!(
                "{} {} {}: {} rows in {} pages -> {} ({outcome})",
                task.exchange, task.symbol, task.interval, task.rows_written, task.pages, task.file
            );
        }
    }
    info!(rows = report.rows_written(), "fetch finished");

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
