//! Quota-aware connector wrapper.
//!
//! Only `fetch_candles` consumes budget; market listing and capability
//! queries pass straight through.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ohlcv_core::{
    Candle, CandleRequest, ExchangeConnector, ExchangeKey, OhlcvError, RateLimitConfig,
};
use tokio::time::Instant;
use tracing::debug;

/// Wrapper that enforces a request budget per fixed, aligned window.
pub struct QuotaAwareConnector {
    inner: Arc<dyn ExchangeConnector>,
    runtime: Mutex<QuotaRuntime>,
}

struct QuotaRuntime {
    limit: u64,
    calls_made_in_window: u64,
    last_reset: Instant,
    window: Duration,
}

impl QuotaAwareConnector {
    /// Create a new quota-aware wrapper around an existing connector.
    pub fn new(inner: Arc<dyn ExchangeConnector>, config: RateLimitConfig) -> Self {
        Self {
            inner,
            runtime: Mutex::new(QuotaRuntime {
                limit: config.limit,
                calls_made_in_window: 0,
                last_reset: Instant::now(),
                window: Duration::from_millis(config.window_ms.max(1)),
            }),
        }
    }

    /// Access the inner connector.
    pub fn inner(&self) -> &Arc<dyn ExchangeConnector> {
        &self.inner
    }

    /// Consume one unit of budget if available.
    ///
    /// # Errors
    /// Returns `OhlcvError::QuotaExceeded` when the window budget is exhausted;
    /// `reset_in_ms` is the time left until the window rolls over.
    pub fn should_allow_call(&self) -> Result<(), OhlcvError> {
        let mut rt = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        // Reset window if elapsed, keeping windows aligned to regular boundaries
        let elapsed = now.duration_since(rt.last_reset);
        if elapsed >= rt.window {
            rt.calls_made_in_window = 0;
            let windows_passed = elapsed.as_nanos() / rt.window.as_nanos();
            let boundary_offset = Duration::from_nanos(
                (windows_passed * rt.window.as_nanos())
                    .try_into()
                    .unwrap_or(u64::MAX),
            );
            rt.last_reset += boundary_offset;
        }

        if rt.calls_made_in_window < rt.limit {
            rt.calls_made_in_window += 1;
            return Ok(());
        }

        let elapsed = now.duration_since(rt.last_reset);
        let reset_in_ms = rt
            .window
            .saturating_sub(elapsed)
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX);
        let remaining = rt.limit.saturating_sub(rt.calls_made_in_window);
        drop(rt);
        Err(OhlcvError::QuotaExceeded {
            remaining,
            reset_in_ms,
        })
    }
}

#[async_trait]
impl ExchangeConnector for QuotaAwareConnector {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn key(&self) -> ExchangeKey {
        self.inner.key()
    }

    fn has_candle_endpoint(&self) -> bool {
        self.inner.has_candle_endpoint()
    }

    fn supported_intervals(&self) -> &[&'static str] {
        self.inner.supported_intervals()
    }

    async fn load_markets(&self) -> Result<Vec<String>, OhlcvError> {
        self.inner.load_markets().await
    }

    async fn fetch_candles(&self, req: &CandleRequest) -> Result<Vec<Candle>, OhlcvError> {
        if let Err(e) = self.should_allow_call() {
            debug!(exchange = self.inner.id(), symbol = %req.symbol, error = %e, "quota exhausted");
            return Err(e);
        }
        self.inner.fetch_candles(req).await
    }

    async fn close(&self) -> Result<(), OhlcvError> {
        self.inner.close().await
    }
}
