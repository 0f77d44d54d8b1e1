//! Mock exchange connectors used by tests and demos.
//!
//! [`MockExchange`] answers from a generated, deterministic history;
//! [`DynamicMockExchange`] is driven by a controller handle.

use async_trait::async_trait;
use ohlcv_core::{CandleRequest, ExchangeConnector, interval_to_ms};
use ohlcv_core::{Candle, OhlcvError};

mod dynamic;

pub use dynamic::{DynamicMockController, DynamicMockExchange, MockBehavior};

/// Intervals served by [`MockExchange`] unless overridden.
pub const MOCK_INTERVALS: [&str; 5] = ["1m", "5m", "15m", "1h", "1d"];
/// Markets listed by [`MockExchange`] unless overridden.
pub const MOCK_MARKETS: [&str; 3] = ["BTC/USDT", "ETH/USDT", "ETH/BTC"];

/// 2019-01-01T00:00:00Z
const DEFAULT_HISTORY_START_MS: i64 = 1_546_300_800_000;
/// 2019-01-08T00:00:00Z
const DEFAULT_HISTORY_END_MS: i64 = 1_546_905_600_000;

/// Mock connector serving a gap-free generated history.
///
/// Candles exist for every interval step from the history start up to and
/// including the history end; values are a pure function of the timestamp.
pub struct MockExchange {
    id: &'static str,
    markets: Vec<String>,
    intervals: Vec<&'static str>,
    history_start_ms: i64,
    history_end_ms: i64,
    has_candles: bool,
}

impl MockExchange {
    /// Create a mock with the default markets, intervals and one week of history.
    #[must_use]
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            markets: MOCK_MARKETS.iter().map(ToString::to_string).collect(),
            intervals: MOCK_INTERVALS.to_vec(),
            history_start_ms: DEFAULT_HISTORY_START_MS,
            history_end_ms: DEFAULT_HISTORY_END_MS,
            has_candles: true,
        }
    }

    /// Replace the listed markets.
    #[must_use]
    pub fn with_markets<I, S>(mut self, markets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markets = markets.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the supported intervals.
    #[must_use]
    pub fn with_intervals(mut self, intervals: &[&'static str]) -> Self {
        self.intervals = intervals.to_vec();
        self
    }

    /// Set the first and last candle opening times (inclusive).
    #[must_use]
    pub const fn with_history(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.history_start_ms = start_ms;
        self.history_end_ms = end_ms;
        self
    }

    /// Pretend the exchange has no candle endpoint.
    #[must_use]
    pub const fn without_candles(mut self) -> Self {
        self.has_candles = false;
        self
    }

    fn candle_at(ts: i64, step: i64) -> Candle {
        #[allow(clippy::cast_precision_loss)]
        let n = ((ts / step) % 97) as f64;
        let open = 100.0 + n;
        Candle::new(ts, open, open + 1.5, open - 1.0, open + 0.5, 10.0 + n / 4.0)
    }

    fn maybe_fail(&self, symbol: &str) -> Result<(), OhlcvError> {
        if symbol.starts_with("FAIL") {
            return Err(OhlcvError::exchange(self.id, format!("forced failure: {symbol}")));
        }
        if symbol.starts_with("BAD") {
            return Err(OhlcvError::malformed(
                self.id,
                format!("could not convert value for {symbol}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeConnector for MockExchange {
    fn id(&self) -> &'static str {
        self.id
    }

    fn has_candle_endpoint(&self) -> bool {
        self.has_candles
    }

    fn supported_intervals(&self) -> &[&'static str] {
        &self.intervals
    }

    async fn load_markets(&self) -> Result<Vec<String>, OhlcvError> {
        Ok(self.markets.clone())
    }

    async fn fetch_candles(&self, req: &CandleRequest) -> Result<Vec<Candle>, OhlcvError> {
        self.maybe_fail(&req.symbol)?;
        if !self.has_candles {
            return Err(OhlcvError::unsupported(self.id, "candles"));
        }
        if !self.markets.iter().any(|m| m == &req.symbol) {
            return Err(OhlcvError::not_found(format!(
                "market {} on {}",
                req.symbol, self.id
            )));
        }
        let step = interval_to_ms(&req.interval)
            .filter(|_| self.intervals.contains(&req.interval.as_str()))
            .ok_or_else(|| {
                OhlcvError::unsupported(self.id, format!("interval {}", req.interval))
            })?;

        let offset = req.since_ms.saturating_sub(self.history_start_ms).max(0);
        let steps = (offset + step - 1) / step;
        let first = self.history_start_ms + steps * step;

        let mut out = Vec::new();
        let mut ts = first;
        while ts <= self.history_end_ms && out.len() < req.limit as usize {
            out.push(Self::candle_at(ts, step));
            ts += step;
        }
        Ok(out)
    }
}
