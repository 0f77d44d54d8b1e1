//! Candle and series types, plus re-exports of the shared `ohlcv-types` primitives.
// Consolidated re-exports so downstream crates can depend on `ohlcv-core` only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use ohlcv_types::{
    BackoffConfig, Capability, ExchangeConfig, ExchangeKey, ExchangeReport, FetchReport,
    FetcherConfig, IntegrityReport, OhlcvError, RateLimitConfig, Settings, TaskOutcome,
    TaskReport,
};

/// Column names of a series file, timestamp first.
pub const OHLCV_COLUMNS: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

/// One OHLCV bar.
///
/// `ts` is the bar's opening time as milliseconds since the Unix epoch. Value
/// fields hold `NaN` for bars inserted by gap repair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Opening time in epoch milliseconds.
    pub ts: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

impl Candle {
    /// Build a candle from its fields.
    #[must_use]
    pub const fn new(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A placeholder bar whose value fields carry the missing-value sentinel.
    #[must_use]
    pub const fn missing(ts: i64) -> Self {
        Self::new(ts, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Whether every value field is missing.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.values().iter().all(|v| v.is_nan())
    }

    /// Value fields in column order.
    #[must_use]
    pub const fn values(&self) -> [f64; 5] {
        [self.open, self.high, self.low, self.close, self.volume]
    }

    /// Opening time as a UTC datetime, if representable.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }
}

/// An ordered candle sequence for one (exchange, symbol, interval).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Candles in file order.
    pub candles: Vec<Candle>,
}

impl Series {
    /// Wrap a candle vector.
    #[must_use]
    pub const fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    /// Number of candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Whether the series holds no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Timestamp of the first candle.
    #[must_use]
    pub fn first_ts(&self) -> Option<i64> {
        self.candles.first().map(|c| c.ts)
    }

    /// Timestamp of the last candle.
    #[must_use]
    pub fn last_ts(&self) -> Option<i64> {
        self.candles.last().map(|c| c.ts)
    }

    /// Timestamps of the last two candles as `(newer, older)`.
    #[must_use]
    pub fn last_two(&self) -> Option<(i64, i64)> {
        match self.candles.as_slice() {
            [.., older, newer] => Some((newer.ts, older.ts)),
            _ => None,
        }
    }

    /// The time index as UTC datetimes; unrepresentable timestamps are skipped.
    #[must_use]
    pub fn index(&self) -> Vec<DateTime<Utc>> {
        self.candles.iter().filter_map(Candle::datetime).collect()
    }
}

impl From<Vec<Candle>> for Series {
    fn from(candles: Vec<Candle>) -> Self {
        Self::new(candles)
    }
}
