//! ohlcv-core
//!
//! Core types, traits, and utilities shared across the ohlcv crates.
//!
//! - `types`: candles, series, and re-exported configuration/report types.
//! - `connector`: the `ExchangeConnector` capability trait implemented by exchange crates.
//! - `timeseries`: timestamp conversion, resolution detection, gap repair and deduplication.
//! - `store`: reading and writing series as delimited text files.
#![warn(missing_docs)]

/// Exchange capability trait and request type.
pub mod connector;
/// Delimited-file persistence for candle series.
pub mod store;
/// Time-series utilities for resolution detection and repair.
pub mod timeseries;
pub mod types;

pub use connector::{CandleRequest, ExchangeConnector};
pub use store::{
    DEFAULT_NA_VALUE, Encoding, SeriesStore, WriteMode, WriteOptions, series_file_name,
};
pub use timeseries::infer::{detect_resolution, estimate_step_ms};
pub use timeseries::reindex::{Keep, MAX_GRID_POINTS, Reindexed, dedup, duplicated, reindex};
pub use timeseries::util::{
    SESSION_ID_LEN, epoch_to_ms, human_readable, interval_to_ms, ms_to_datetime, ms_to_epoch, parse_datetime_ms,
    percentage, session_id, string_resolution_to_ms,
};
pub use types::*;
