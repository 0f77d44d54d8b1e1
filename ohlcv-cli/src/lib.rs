//! Shared plumbing for the `fetch-ohlcv` and `check-integrity` binaries.
#![warn(missing_docs)]

use std::sync::Arc;

use ohlcv::{ExchangeConnector, OhlcvError};
use ohlcv_binance::BinanceConnector;
use ohlcv_mock::MockExchange;
use tracing_subscriber::EnvFilter;

/// When set, `fetch-ohlcv` also registers the offline `mock` exchange.
pub const USE_MOCK_ENV: &str = "OHLCV_USE_MOCK";

/// Exit code for configuration errors detected before fetching starts.
pub const EXIT_CONFIG: u8 = 2;

/// Install the process-wide tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `debug` selects the `debug` level
/// and everything else logs at `info`.
pub fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// The built-in exchange connectors.
///
/// # Errors
/// Returns an error if a connector's HTTP client cannot be constructed.
pub fn connectors(debug: bool) -> Result<Vec<Arc<dyn ExchangeConnector>>, OhlcvError> {
    let mut out: Vec<Arc<dyn ExchangeConnector>> =
        vec![Arc::new(BinanceConnector::builder().verbose(debug).build()?)];
    if std::env::var_os(USE_MOCK_ENV).is_some() {
        out.push(Arc::new(MockExchange::new("mock")));
    }
    Ok(out)
}

/// Parse a single-byte field delimiter; `\t` is accepted for tab.
///
/// # Errors
/// Returns a message unless the input is exactly one ASCII character.
pub fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got {s:?}")),
        },
    }
}
