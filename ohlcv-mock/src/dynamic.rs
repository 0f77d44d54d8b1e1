use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ohlcv_core::{Candle, CandleRequest, ExchangeConnector, OhlcvError};

/// Instruction for how a call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(OhlcvError),
    /// Hang indefinitely (simulate a stalled request).
    Hang,
}

impl<T> MockBehavior<T> {
    async fn resolve(self) -> Result<T, OhlcvError> {
        match self {
            Self::Return(v) => Ok(v),
            Self::Fail(e) => Err(e),
            Self::Hang => std::future::pending().await,
        }
    }
}

type PageKey = (String, String);

#[derive(Default)]
struct InternalState {
    markets: Option<MockBehavior<Vec<String>>>,
    pages: HashMap<PageKey, VecDeque<MockBehavior<Vec<Candle>>>>,
    requests: Vec<CandleRequest>,
    closed: usize,
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
#[derive(Clone)]
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Set the behavior for `load_markets`.
    pub async fn set_markets(&self, behavior: MockBehavior<Vec<String>>) {
        let mut guard = self.state.lock().await;
        guard.markets = Some(behavior);
    }

    /// Queue page behaviors for one (symbol, interval).
    ///
    /// Each `fetch_candles` call pops the next entry; an exhausted queue
    /// answers with an empty page.
    pub async fn push_pages<I>(&self, symbol: &str, interval: &str, pages: I)
    where
        I: IntoIterator<Item = MockBehavior<Vec<Candle>>>,
    {
        let mut guard = self.state.lock().await;
        guard
            .pages
            .entry((symbol.to_string(), interval.to_string()))
            .or_default()
            .extend(pages);
    }

    /// Every candle request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<CandleRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Requests received for one (symbol, interval).
    pub async fn requests_for(&self, symbol: &str, interval: &str) -> Vec<CandleRequest> {
        let guard = self.state.lock().await;
        guard
            .requests
            .iter()
            .filter(|r| r.symbol == symbol && r.interval == interval)
            .cloned()
            .collect()
    }

    /// Number of queued page behaviors not yet consumed.
    pub async fn pending_pages(&self) -> usize {
        let guard = self.state.lock().await;
        guard.pages.values().map(VecDeque::len).sum()
    }

    /// How many times `close` was called.
    pub async fn close_count(&self) -> usize {
        self.state.lock().await.closed
    }

    /// Clear all configured behaviors and request logs.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.markets = None;
        guard.pages.clear();
        guard.requests.clear();
        guard.closed = 0;
    }
}

/// A connector that defers all behavior to an external controller.
pub struct DynamicMockExchange {
    id: &'static str,
    intervals: Vec<&'static str>,
    has_candles: bool,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockExchange {
    /// Create a new dynamic mock exchange and its controller.
    #[must_use]
    pub fn new_with_controller(
        id: &'static str,
        intervals: &[&'static str],
    ) -> (Arc<dyn ExchangeConnector>, DynamicMockController) {
        let (me, controller) = Self::build(id, intervals, true);
        (me as Arc<dyn ExchangeConnector>, controller)
    }

    /// Like [`new_with_controller`](Self::new_with_controller) for an exchange without
    /// a candle endpoint.
    #[must_use]
    pub fn without_candles(
        id: &'static str,
        intervals: &[&'static str],
    ) -> (Arc<dyn ExchangeConnector>, DynamicMockController) {
        let (me, controller) = Self::build(id, intervals, false);
        (me as Arc<dyn ExchangeConnector>, controller)
    }

    fn build(
        id: &'static str,
        intervals: &[&'static str],
        has_candles: bool,
    ) -> (Arc<Self>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self {
            id,
            intervals: intervals.to_vec(),
            has_candles,
            state,
        });
        (me, controller)
    }
}

#[async_trait]
impl ExchangeConnector for DynamicMockExchange {
    fn id(&self) -> &'static str {
        self.id
    }

    fn has_candle_endpoint(&self) -> bool {
        self.has_candles
    }

    fn supported_intervals(&self) -> &[&'static str] {
        &self.intervals
    }

    async fn load_markets(&self) -> Result<Vec<String>, OhlcvError> {
        // Acquire behavior snapshot without holding the lock across await points
        let behavior = self.state.lock().await.markets.clone();
        behavior
            .unwrap_or_else(|| MockBehavior::Return(Vec::new()))
            .resolve()
            .await
    }

    async fn fetch_candles(&self, req: &CandleRequest) -> Result<Vec<Candle>, OhlcvError> {
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.requests.push(req.clone());
            guard
                .pages
                .get_mut(&(req.symbol.clone(), req.interval.clone()))
                .and_then(VecDeque::pop_front)
        };
        behavior
            .unwrap_or_else(|| MockBehavior::Return(Vec::new()))
            .resolve()
            .await
    }

    async fn close(&self) -> Result<(), OhlcvError> {
        self.state.lock().await.closed += 1;
        Ok(())
    }
}
