//! Builder for composing a raw connector with middleware layers.

use std::sync::Arc;

use ohlcv_core::{ExchangeConnector, RateLimitConfig};

use crate::quota::QuotaAwareConnector;

/// Composes a connector with the layers configured for its exchange.
pub struct ConnectorBuilder {
    raw: Arc<dyn ExchangeConnector>,
    quota: Option<RateLimitConfig>,
}

impl ConnectorBuilder {
    /// Create a new builder from a raw, unwrapped connector.
    #[must_use]
    pub fn new(raw: Arc<dyn ExchangeConnector>) -> Self {
        Self { raw, quota: None }
    }

    /// Add or replace the request quota; `None` removes it.
    #[must_use]
    pub const fn with_quota(mut self, cfg: Option<RateLimitConfig>) -> Self {
        self.quota = cfg;
        self
    }

    /// Build the wrapped connector.
    #[must_use]
    pub fn build(self) -> Arc<dyn ExchangeConnector> {
        match self.quota {
            Some(cfg) => Arc::new(QuotaAwareConnector::new(self.raw, cfg)),
            None => self.raw,
        }
    }
}
