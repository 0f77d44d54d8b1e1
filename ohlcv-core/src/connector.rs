use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::types::{Candle, ExchangeKey, OhlcvError};

/// One page request for historical candles.
///
/// A request is built fresh for every attempt and carries all per-attempt
/// client configuration (the proxy in particular), so connectors shared between
/// concurrent tasks never need mutable state to honour it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    /// Unified market symbol, e.g. `BTC/USDT`.
    pub symbol: String,
    /// Exchange interval label, e.g. `1h`.
    pub interval: String,
    /// Earliest candle opening time to return, epoch milliseconds.
    pub since_ms: i64,
    /// Maximum number of candles to return.
    pub limit: u32,
    /// Proxy address to route this request through.
    pub proxy: Option<String>,
    /// Extra exchange-specific query parameters.
    pub params: BTreeMap<String, String>,
}

impl CandleRequest {
    /// Build a request without proxy or extra params.
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        since_ms: i64,
        limit: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            since_ms,
            limit,
            proxy: None,
            params: BTreeMap::new(),
        }
    }

    /// Route this request through a proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Attach an exchange-specific query parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Capability interface implemented by exchange crates.
///
/// Errors returned from [`fetch_candles`](ExchangeConnector::fetch_candles) must be
/// classified: rate limits, timeouts, unavailability and generic exchange errors
/// map to the transient variants of [`OhlcvError`]; authentication and parse
/// failures map to `Authentication` and `MalformedResponse`.
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// Stable exchange id matched against configuration blocks (e.g. "binance").
    fn id(&self) -> &'static str;

    /// Typed key constructed from the static id.
    fn key(&self) -> ExchangeKey {
        ExchangeKey::new(self.id())
    }

    /// Whether the exchange serves historical candles at all.
    fn has_candle_endpoint(&self) -> bool;

    /// Interval labels the candle endpoint accepts.
    fn supported_intervals(&self) -> &[&'static str];

    /// List tradable markets as unified symbols.
    async fn load_markets(&self) -> Result<Vec<String>, OhlcvError>;

    /// Fetch up to `req.limit` candles opening at or after `req.since_ms`,
    /// ordered by timestamp.
    async fn fetch_candles(&self, req: &CandleRequest) -> Result<Vec<Candle>, OhlcvError>;

    /// Release connection resources. Called once after all tasks of the exchange end.
    async fn close(&self) -> Result<(), OhlcvError> {
        Ok(())
    }
}
