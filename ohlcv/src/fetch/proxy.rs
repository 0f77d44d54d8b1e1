use std::sync::Arc;

use rand::seq::IndexedRandom;

use ohlcv_core::{SESSION_ID_LEN, session_id};

/// Placeholder replaced by a fresh session id on every pick.
pub const SESSION_PLACEHOLDER: &str = "{rand}";

/// Read-only set of proxy addresses shared by all fetch tasks.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Arc<[String]>,
}

impl ProxyPool {
    /// Build a pool from configured addresses.
    pub fn new<I, S>(proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            proxies: proxies.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether no proxies are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Pick a proxy uniformly at random, substituting a fresh session id for
    /// every `{rand}` placeholder. `None` when the pool is empty.
    #[must_use]
    pub fn pick(&self) -> Option<String> {
        let chosen = self.proxies.choose(&mut rand::rng())?;
        if chosen.contains(SESSION_PLACEHOLDER) {
            Some(chosen.replace(SESSION_PLACEHOLDER, &session_id(SESSION_ID_LEN)))
        } else {
            Some(chosen.clone())
        }
    }
}
