//! Exchange metadata types usable across crates.

use core::fmt;

/// Typed key identifying an exchange connector in the fetcher registry.
///
/// Keys are compared case-insensitively against configuration ids, so the
/// `[exchanges.Binance]` and `[exchanges.binance]` blocks resolve the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeKey(pub &'static str);

impl ExchangeKey {
    /// Construct a new typed exchange key from a static id.
    #[must_use]
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    /// Returns the inner static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// Whether this key matches a configuration id.
    #[must_use]
    pub fn matches(self, id: &str) -> bool {
        self.0.eq_ignore_ascii_case(id.trim())
    }
}

impl From<ExchangeKey> for &'static str {
    fn from(k: ExchangeKey) -> Self {
        k.0
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
