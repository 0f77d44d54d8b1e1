use core::fmt;
use serde::{Deserialize, Serialize};

/// Capability labels for exchange connectors, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Historical OHLCV candles.
    Candles,
    /// A specific candle interval (e.g. `1h`).
    Interval,
    /// Market (symbol) listing.
    Markets,
}

impl Capability {
    /// Stable, kebab-case identifier for logs/errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Candles => "candles",
            Self::Interval => "interval",
            Self::Markets => "markets",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
