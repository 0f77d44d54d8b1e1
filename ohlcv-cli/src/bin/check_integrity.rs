//! Check stored OHLCV series for duplicates and gaps, optionally writing the
//! repaired series.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ohlcv::{
    IntegrityChecker, IntegrityOptions, IntegrityReport, WriteTarget, collect_files,
    human_readable, ms_to_datetime,
};
use ohlcv_cli::{init_logging, parse_delimiter};

#[derive(Parser)]
#[command(
    name = "check-integrity",
    version,
    about = "Detect and repair gaps in OHLCV series files"
)]
struct Cli {
    /// Series file, or a directory whose files are all checked
    path: PathBuf,

    /// Field delimiter
    #[arg(short = 'd', long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Resolution of the series; detected from the last two rows when omitted
    #[arg(short = 'r', long, value_parser = ["second", "minute", "hourly", "daily"])]
    resolution: Option<String>,

    /// Write a header row to repaired files
    #[arg(long)]
    write_headers: bool,

    /// Token for missing values
    #[arg(long, default_value = "nan")]
    na_value: String,

    /// Overwrite the checked file with the repaired series
    #[arg(short = 'w', long)]
    write_file: bool,

    /// Write the repaired series to `<file>_REPAIRED`
    #[arg(short = 'n', long)]
    new_file: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

fn format_ts(ms: i64) -> String {
    ms_to_datetime(ms).map_or_else(
        || ms.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn print_report(report: &IntegrityReport) {
    println!("Found {} data points", report.raw_rows);
    println!("Date of first data point: {}", format_ts(report.first_ts_ms));
    println!("Date of last data point: {}", format_ts(report.last_ts_ms));
    println!(
        "Detected resolution: {} ({} milliseconds)",
        human_readable(report.resolution_ms),
        report.resolution_ms
    );
    if report.duplicate_rows > 0 {
        println!("Dropped {} duplicate data points", report.duplicate_rows);
    }
    println!(
        "Found {} missing data points ({:.2}% of the data is missing)",
        report.missing_rows, report.missing_pct
    );
    if let Some(dest) = &report.written_to {
        println!("{} data points successfully written to {dest}", report.fixed_rows);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let files = match collect_files(&cli.path) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let checker = IntegrityChecker::new(IntegrityOptions {
        delimiter: cli.delimiter,
        resolution: cli.resolution,
        write_headers: cli.write_headers,
        na_value: cli.na_value,
        target: WriteTarget::from_flags(cli.write_file, cli.new_file),
    });

    let mut failed = false;
    for file in files {
        println!("Loading file: {}", file.display());
        match checker.check_file(&file) {
            Ok(report) => print_report(&report),
            Err(e) if e.is_skippable() => println!("Skipping {}: {e}", file.display()),
            Err(e) => {
                eprintln!("Error: {}: {e}", file.display());
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
