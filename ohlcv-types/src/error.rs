use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the ohlcv workspace.
///
/// Variants fall into four groups: configuration and capability problems that
/// abort before or at the start of a fetch, transient exchange failures that the
/// fetch cursor retries, fatal exchange failures that end a task, and integrity
/// check conditions that skip a single file.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OhlcvError {
    /// Malformed or inconsistent configuration document.
    #[error("configuration error: {0}")]
    Config(String),

    /// The exchange does not offer the requested capability.
    #[error("{exchange} does not support {capability}")]
    Unsupported {
        /// Exchange id.
        exchange: String,
        /// Capability description (e.g. "candles", "interval 7m").
        capability: String,
    },

    /// No connector is registered for a configured exchange id.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },

    /// The exchange rejected the request because of rate limiting.
    #[error("{exchange} rate limited the request: {msg}")]
    RateLimited {
        /// Exchange id.
        exchange: String,
        /// Upstream message.
        msg: String,
    },

    /// The request did not complete in time.
    #[error("request to {exchange} timed out")]
    Timeout {
        /// Exchange id.
        exchange: String,
    },

    /// The exchange is temporarily unreachable or in maintenance.
    #[error("{exchange} is unavailable: {msg}")]
    ExchangeUnavailable {
        /// Exchange id.
        exchange: String,
        /// Upstream message.
        msg: String,
    },

    /// Generic exchange-side error.
    #[error("{exchange} failed: {msg}")]
    Exchange {
        /// Exchange id.
        exchange: String,
        /// Upstream message.
        msg: String,
    },

    /// A client-side request budget is exhausted for the current window.
    #[error("quota exceeded: remaining={remaining} reset_in_ms={reset_in_ms}")]
    QuotaExceeded {
        /// Remaining units at the time of rejection.
        remaining: u64,
        /// Milliseconds until the quota window resets.
        reset_in_ms: u64,
    },

    /// The exchange rejected the credentials.
    #[error("{exchange} authentication failed: {msg}")]
    Authentication {
        /// Exchange id.
        exchange: String,
        /// Upstream message.
        msg: String,
    },

    /// The response could not be parsed into candles or markets.
    #[error("malformed response from {exchange}: {msg}")]
    MalformedResponse {
        /// Exchange id.
        exchange: String,
        /// Parse failure description.
        msg: String,
    },

    /// Transient failures persisted past the configured retry budget.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of consecutive failed attempts.
        attempts: u32,
        /// The last transient error observed.
        last: Box<OhlcvError>,
    },

    /// A series file contains no data rows.
    #[error("no rows found in {path}")]
    EmptyInput {
        /// File path.
        path: String,
    },

    /// A series has too few rows to derive a resolution.
    #[error("{path} has {rows} row(s); at least 2 are required")]
    InsufficientData {
        /// File path.
        path: String,
        /// Number of rows found.
        rows: usize,
    },

    /// Percentage of a zero whole.
    #[error("division by zero")]
    DivisionByZero,

    /// Unknown resolution name or non-positive resolution value.
    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with stored or returned data (bad field counts, unparsable numbers).
    #[error("data issue: {0}")]
    Data(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(String),
}

impl OhlcvError {
    /// Helper: build an `Unsupported` error.
    pub fn unsupported(exchange: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Unsupported {
            exchange: exchange.into(),
            capability: capability.into(),
        }
    }

    /// Helper: build a generic `Exchange` error with the exchange id and message.
    pub fn exchange(exchange: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Exchange {
            exchange: exchange.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `MalformedResponse` error.
    pub fn malformed(exchange: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            exchange: exchange.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Config` error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the fetch cursor should retry the same request after this error.
    ///
    /// Rate limits, timeouts, unavailability, generic exchange errors and local
    /// quota exhaustion are transient. Everything else ends the task.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ExchangeUnavailable { .. }
                | Self::Exchange { .. }
                | Self::QuotaExceeded { .. }
        )
    }

    /// Whether an integrity check should skip the file and continue.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::EmptyInput { .. } | Self::InsufficientData { .. })
    }

    /// Minimum wait suggested by the error itself, in milliseconds.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::QuotaExceeded { reset_in_ms, .. } => Some(*reset_in_ms),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OhlcvError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
