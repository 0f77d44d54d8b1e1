//! ohlcv pages historical candle data from crypto exchanges into delimited
//! series files, and checks stored series for gaps and duplicates.
//!
//! Overview
//! - [`Fetcher`] resolves a [`FetcherConfig`] against registered
//!   [`ExchangeConnector`]s and runs one paging task per (exchange, symbol,
//!   interval) triple.
//! - Each task is a [`FetchCursor`]: a pure state machine that requests a page,
//!   appends it, derives the candle width from the page's last two rows and
//!   advances past the last row. The async driver executes its actions.
//! - [`IntegrityChecker`] reads a stored series, drops duplicate timestamps,
//!   reindexes it onto its canonical grid and optionally writes the repair.
//!
//! Key behaviors and trade-offs
//! - Transient exchange errors are retried at the same cursor position with
//!   exponential backoff and jitter, bounded by `settings.retry.max_attempts`.
//!   Nothing is written for a failed page, so retries never duplicate rows.
//! - Malformed pages and capability mismatches are fatal. The first fatal task
//!   failure in an exchange cancels its sibling tasks and is reported on the
//!   exchange.
//! - An empty `until` tails the exchange: once caught up, the task polls every
//!   `settings.poll_interval_ms` until shut down.
//! - Proxies are picked per request and carried inside the request, so
//!   connectors are shared between tasks without mutation.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use ohlcv::{Fetcher, FetcherConfig};
//! use ohlcv_binance::BinanceConnector;
//!
//! let cfg = FetcherConfig::load("config.toml")?;
//! let fetcher = Fetcher::builder()
//!     .with_exchange(Arc::new(BinanceConnector::builder().build()?))
//!     .config(cfg)
//!     .build()?;
//! let report = fetcher.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! if report.has_failures() {
//!     std::process::exit(1);
//! }
//! ```
//!
//! Checking a directory of series files:
//! ```rust,ignore
//! use ohlcv::{IntegrityChecker, IntegrityOptions, WriteTarget};
//!
//! let checker = IntegrityChecker::new(IntegrityOptions {
//!     target: WriteTarget::NewFile,
//!     ..IntegrityOptions::default()
//! });
//! for (path, result) in checker.check_path("data")? {
//!     println!("{}: {:?}", path.display(), result.map(|r| r.missing_rows));
//! }
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
pub mod fetch;
pub mod integrity;

pub use core::{Fetcher, FetcherBuilder};
pub use fetch::{
    CursorAction, CursorEvent, CursorState, FetchCursor, FetchTask, ProxyPool, RetryPolicy,
};
pub use integrity::{
    IntegrityChecker, IntegrityOptions, REPAIRED_SUFFIX, WriteTarget, collect_files,
    repaired_path,
};

pub use ohlcv_middleware::{ConnectorBuilder, QuotaAwareConnector};

// Re-export core types for convenience
pub use ohlcv_core::{
    BackoffConfig, Candle, CandleRequest, Capability, ExchangeConfig, ExchangeConnector,
    ExchangeKey, ExchangeReport, FetchReport, FetcherConfig, IntegrityReport, OhlcvError,
    RateLimitConfig, Series, SeriesStore, Settings, TaskOutcome, TaskReport, WriteMode,
    WriteOptions, human_readable, interval_to_ms, ms_to_datetime, series_file_name,
    string_resolution_to_ms,
};
