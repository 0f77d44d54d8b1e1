// Shared fixtures for the fetcher and integrity tests.
#![allow(dead_code)]

use std::path::Path;

use ohlcv::{Candle, FetcherConfig, Series, SeriesStore, WriteOptions, series_file_name};

/// 2019-01-01T00:00:00Z in milliseconds.
pub const T0: i64 = 1_546_300_800_000;
pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 3_600_000;

pub const BTC: &str = "BTC/USDT";
pub const ETH: &str = "ETH/USDT";

/// `n` consecutive bars starting at `from`, `step` apart.
pub fn bars(from: i64, n: i64, step: i64) -> Vec<Candle> {
    (0..n).map(|i| bar(from + i * step)).collect()
}

/// One well-formed bar whose values depend on its timestamp.
pub fn bar(ts: i64) -> Candle {
    #[allow(clippy::cast_precision_loss)]
    let base = 100.0 + ((ts / MINUTE) % 50) as f64;
    Candle::new(ts, base, base + 2.0, base - 1.0, base + 0.5, 12.5)
}

/// Parse a TOML document and point its output directory at `dir`.
pub fn config(dir: &Path, toml: &str) -> FetcherConfig {
    let mut cfg = FetcherConfig::from_toml_str(toml).unwrap();
    cfg.settings.output_dir = dir.display().to_string();
    cfg
}

/// Read the series the fetcher wrote for one triple.
pub fn read_series(dir: &Path, exchange: &str, symbol: &str, interval: &str) -> Series {
    let path = dir.join(series_file_name(exchange, symbol, interval));
    SeriesStore::new(path, WriteOptions::default()).read().unwrap()
}

/// Whether the series file for one triple exists.
pub fn series_exists(dir: &Path, exchange: &str, symbol: &str, interval: &str) -> bool {
    dir.join(series_file_name(exchange, symbol, interval)).exists()
}

/// Write `lines` joined by newlines to `path`.
pub fn write_lines(path: &Path, lines: &[&str]) {
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(path, text).unwrap();
}
