//! ohlcv-binance
//!
//! Connector that implements `ExchangeConnector` on top of the Binance spot
//! REST API: market listing from `exchangeInfo` and paged candles from
//! `klines`.
#![warn(missing_docs)]

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};
use url::Url;

use ohlcv_core::{Candle, CandleRequest, ExchangeConnector, ExchangeKey, OhlcvError};

/// Exchange id matched against `[exchanges.binance]` configuration blocks.
pub const EXCHANGE_ID: &str = "binance";

/// Production REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Interval labels accepted by the klines endpoint.
pub const BINANCE_INTERVALS: [&str; 16] = [
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Public connector type. Construct with [`BinanceConnector::builder`].
pub struct BinanceConnector {
    client: Client,
    base: Url,
    timeout: Duration,
    verbose: bool,
}

/// Builder for [`BinanceConnector`].
#[derive(Debug, Clone)]
pub struct BinanceConnectorBuilder {
    base_url: String,
    timeout: Duration,
    verbose: bool,
}

impl Default for BinanceConnectorBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
        }
    }
}

impl BinanceConnectorBuilder {
    /// Point the connector at a different host (testnet, local mock server).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log every request and response status at debug level.
    #[must_use]
    pub const fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    /// Build the connector.
    ///
    /// # Errors
    /// Returns `OhlcvError::Config` for an unparsable base URL or if the HTTP
    /// client cannot be initialized.
    pub fn build(self) -> Result<BinanceConnector, OhlcvError> {
        let mut base_url = self.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)
            .map_err(|e| OhlcvError::config(format!("invalid base url {base_url:?}: {e}")))?;
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| OhlcvError::config(format!("http client: {e}")))?;
        Ok(BinanceConnector {
            client,
            base,
            timeout: self.timeout,
            verbose: self.verbose,
        })
    }
}

impl BinanceConnector {
    /// Static connector key.
    pub const KEY: ExchangeKey = ExchangeKey::new(EXCHANGE_ID);

    /// Returns a builder targeting the production endpoint.
    #[must_use]
    pub fn builder() -> BinanceConnectorBuilder {
        BinanceConnectorBuilder::default()
    }

    /// Exchange symbol for a unified `BASE/QUOTE` symbol.
    #[must_use]
    pub fn market_id(symbol: &str) -> String {
        symbol.replace('/', "").to_uppercase()
    }

    fn endpoint(&self, path: &str) -> Result<Url, OhlcvError> {
        self.base
            .join(path)
            .map_err(|e| OhlcvError::config(format!("invalid endpoint {path}: {e}")))
    }

    /// One-off client routing through `proxy` with `Connection: close`.
    fn proxied_client(&self, proxy: &str) -> Result<Client, OhlcvError> {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| OhlcvError::config(format!("invalid proxy: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        Client::builder()
            .proxy(proxy)
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| OhlcvError::config(format!("http client: {e}")))
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        proxy: Option<&str>,
    ) -> Result<String, OhlcvError> {
        let url = self.endpoint(path)?;
        let client = match proxy {
            Some(p) => self.proxied_client(p)?,
            None => self.client.clone(),
        };
        if self.verbose {
            debug!(%url, ?query, proxied = proxy.is_some(), "binance request");
        }

        let resp = client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| map_transport_error(&e))?;

        if self.verbose {
            debug!(%status, bytes = body.len(), "binance response");
        } else {
            trace!(%status, bytes = body.len(), "binance response");
        }
        if status.is_success() {
            Ok(body)
        } else {
            Err(map_status(status, &body))
        }
    }
}

fn map_transport_error(e: &reqwest::Error) -> OhlcvError {
    if e.is_timeout() {
        OhlcvError::Timeout {
            exchange: EXCHANGE_ID.to_string(),
        }
    } else if e.is_connect() {
        OhlcvError::ExchangeUnavailable {
            exchange: EXCHANGE_ID.to_string(),
            msg: e.to_string(),
        }
    } else if e.is_decode() {
        OhlcvError::malformed(EXCHANGE_ID, e.to_string())
    } else {
        OhlcvError::exchange(EXCHANGE_ID, e.to_string())
    }
}

fn map_status(status: StatusCode, body: &str) -> OhlcvError {
    let msg = serde_json::from_str::<wire::ApiError>(body).map_or_else(
        |_| format!("status {status}"),
        |api| format!("status {status}: {} (code {})", api.msg, api.code),
    );
    let exchange = EXCHANGE_ID.to_string();
    match status.as_u16() {
        429 | 418 => OhlcvError::RateLimited { exchange, msg },
        401 | 403 => OhlcvError::Authentication { exchange, msg },
        500..=599 => OhlcvError::ExchangeUnavailable { exchange, msg },
        _ => OhlcvError::Exchange { exchange, msg },
    }
}

#[async_trait]
impl ExchangeConnector for BinanceConnector {
    fn id(&self) -> &'static str {
        EXCHANGE_ID
    }

    fn key(&self) -> ExchangeKey {
        Self::KEY
    }

    fn has_candle_endpoint(&self) -> bool {
        true
    }

    fn supported_intervals(&self) -> &[&'static str] {
        &BINANCE_INTERVALS
    }

    async fn load_markets(&self) -> Result<Vec<String>, OhlcvError> {
        let body = self.get("api/v3/exchangeInfo", &[], None).await?;
        let info: wire::ExchangeInfo = serde_json::from_str(&body)
            .map_err(|e| OhlcvError::malformed(EXCHANGE_ID, e.to_string()))?;
        Ok(info.symbols.iter().map(wire::SymbolInfo::unified).collect())
    }

    async fn fetch_candles(&self, req: &CandleRequest) -> Result<Vec<Candle>, OhlcvError> {
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", Self::market_id(&req.symbol)),
            ("interval", req.interval.clone()),
            ("startTime", req.since_ms.to_string()),
            ("limit", req.limit.to_string()),
        ];
        query.extend(req.params.iter().map(|(k, v)| (k.as_str(), v.clone())));
        let body = self
            .get("api/v3/klines", &query, req.proxy.as_deref())
            .await?;
        wire::decode_klines(&body)
    }
}
