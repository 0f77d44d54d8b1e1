//! Shared data transfer objects and configuration primitives for the ohlcv workspace.
#![warn(missing_docs)]

mod capability;
mod config;
mod error;
mod exchange;
mod reports;

pub use capability::Capability;
pub use config::{
    BackoffConfig, DEFAULT_DELIMITER, DEFAULT_PAGE_LIMIT, ExchangeConfig, FetcherConfig,
    RateLimitConfig, Settings,
};
pub use error::OhlcvError;
pub use exchange::ExchangeKey;
pub use reports::{ExchangeReport, FetchReport, IntegrityReport, TaskOutcome, TaskReport};
