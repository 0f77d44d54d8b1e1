use ohlcv_core::{Candle, OhlcvError, TaskOutcome, TaskReport, detect_resolution, interval_to_ms};

use super::backoff::RetryPolicy;
use super::proxy::ProxyPool;

/// Immutable description of one (exchange, symbol, interval) fetch.
#[derive(Debug, Clone)]
pub struct FetchTask {
    /// Exchange id.
    pub exchange: String,
    /// Unified market symbol.
    pub symbol: String,
    /// Exchange interval label.
    pub interval: String,
    /// First candle opening time to fetch (ms).
    pub since_ms: i64,
    /// Last candle opening time to fetch (ms); 0 keeps the task tailing forever.
    pub until_ms: i64,
    /// Candles requested per page.
    pub limit: u32,
    /// Proxies to route page requests through.
    pub proxies: ProxyPool,
}

impl FetchTask {
    /// Whether the task stops once it passes `until_ms`.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.until_ms != 0
    }
}

/// Where a [`FetchCursor`] is in its paging loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorState {
    /// A page request is in flight.
    Paging,
    /// A page is being appended.
    Writing {
        /// Next cursor position; `None` ends the task once the page is on disk.
        advance_to: Option<i64>,
    },
    /// Waiting before retrying the same page.
    Backoff {
        /// Consecutive failures so far; quota waits do not count.
        attempt: u32,
    },
    /// Caught up with an unbounded fetch; waiting for new candles.
    Polling,
    /// The bounded window is exhausted or the width of further pages is unknown.
    Done,
    /// Stopped on a fatal error.
    Failed(OhlcvError),
    /// Stopped from outside.
    Cancelled,
}

impl CursorState {
    /// Whether the cursor accepts no further events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }
}

/// Input fed to a [`FetchCursor`] by its driver.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorEvent {
    /// Begin paging.
    Start,
    /// The requested page arrived.
    PageFetched(Vec<Candle>),
    /// The page request failed.
    FetchFailed(OhlcvError),
    /// The appended rows are on disk.
    Written {
        /// Rows written.
        rows: usize,
    },
    /// Appending failed.
    WriteFailed(OhlcvError),
    /// A requested sleep elapsed.
    Woke,
    /// Stop now.
    Cancel,
}

/// Work the driver performs for a [`FetchCursor`].
#[derive(Debug, Clone, PartialEq)]
pub enum CursorAction {
    /// Request one page; answer with `PageFetched` or `FetchFailed`.
    Fetch {
        /// Earliest opening time to return.
        since_ms: i64,
        /// Page size.
        limit: u32,
    },
    /// Append rows to the series file; answer with `Written` or `WriteFailed`.
    Append(Vec<Candle>),
    /// Wait, then answer with `Woke`.
    Sleep {
        /// Milliseconds to wait.
        delay_ms: u64,
    },
    /// The cursor reached a terminal state.
    Stop,
}

/// Paging state machine for one [`FetchTask`].
///
/// The cursor performs no I/O. A driver feeds it [`CursorEvent`]s and executes
/// the returned [`CursorAction`]s in order.
#[derive(Debug, Clone)]
pub struct FetchCursor {
    task: FetchTask,
    retry: RetryPolicy,
    poll_interval_ms: u64,
    state: CursorState,
    next_since_ms: i64,
    last_two: Option<(i64, i64)>,
    resolution_ms: Option<i64>,
    failures: u32,
    pages: u64,
    rows_written: u64,
}

impl FetchCursor {
    /// A cursor positioned at the task's `since_ms`.
    #[must_use]
    pub const fn new(task: FetchTask, retry: RetryPolicy, poll_interval_ms: u64) -> Self {
        let next_since_ms = task.since_ms;
        Self {
            task,
            retry,
            poll_interval_ms,
            state: CursorState::Paging,
            next_since_ms,
            last_two: None,
            resolution_ms: None,
            failures: 0,
            pages: 0,
            rows_written: 0,
        }
    }

    /// The task this cursor pages through.
    #[must_use]
    pub const fn task(&self) -> &FetchTask {
        &self.task
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &CursorState {
        &self.state
    }

    /// Opening time the next page request starts at.
    #[must_use]
    pub const fn next_since_ms(&self) -> i64 {
        self.next_since_ms
    }

    /// Timestamps of the last two rows of the latest multi-row page, as `(newer, older)`.
    #[must_use]
    pub const fn last_two(&self) -> Option<(i64, i64)> {
        self.last_two
    }

    /// Candle width derived so far.
    #[must_use]
    pub const fn resolution_ms(&self) -> Option<i64> {
        self.resolution_ms
    }

    /// Apply an event and return the next state with the actions to execute.
    ///
    /// Policies:
    /// - Termination is checked before every request: a bounded task whose
    ///   cursor passed `until_ms` is done without issuing a request.
    /// - Rows older than the cursor or newer than `until_ms` are dropped; a
    ///   page whose timestamps do not strictly increase is fatal.
    /// - An empty page ends a bounded task and makes an unbounded one poll.
    /// - A one-row page reuses the previous width, else the nominal interval
    ///   width; with neither the row is written and the task ends.
    /// - Transient errors back off and retry the same position until the
    ///   retry budget runs out; other errors are fatal.
    pub fn handle(mut self, event: CursorEvent) -> (Self, Vec<CursorAction>) {
        let prev = std::mem::replace(&mut self.state, CursorState::Paging);
        match (prev, event) {
            (state, _) if state.is_terminal() => (Self { state, ..self }, Vec::new()),
            (_, CursorEvent::Cancel) => self.stop(CursorState::Cancelled),
            (CursorState::Paging, CursorEvent::Start) => self.request(),
            (CursorState::Paging, CursorEvent::PageFetched(rows)) => self.on_page(rows),
            (CursorState::Paging, CursorEvent::FetchFailed(err)) => self.on_fetch_error(err),
            (CursorState::Backoff { .. } | CursorState::Polling, CursorEvent::Woke) => {
                self.request()
            }
            (CursorState::Writing { advance_to }, CursorEvent::Written { rows }) => {
                self.pages += 1;
                self.rows_written += u64::try_from(rows).unwrap_or(u64::MAX);
                match advance_to {
                    Some(since) => {
                        self.next_since_ms = since;
                        self.request()
                    }
                    None => self.stop(CursorState::Done),
                }
            }
            (CursorState::Writing { .. }, CursorEvent::WriteFailed(err)) => {
                self.stop(CursorState::Failed(err))
            }
            // events that do not apply to the current state leave it untouched
            (state, _) => (Self { state, ..self }, Vec::new()),
        }
    }

    /// Summarize the cursor for the orchestrator; non-terminal states report as cancelled.
    #[must_use]
    pub fn into_report(self, file: impl Into<String>) -> TaskReport {
        let outcome = match self.state {
            CursorState::Done => TaskOutcome::Done,
            CursorState::Failed(e) => TaskOutcome::Failed(e),
            _ => TaskOutcome::Cancelled,
        };
        TaskReport {
            exchange: self.task.exchange,
            symbol: self.task.symbol,
            interval: self.task.interval,
            file: file.into(),
            pages: self.pages,
            rows_written: self.rows_written,
            next_since_ms: self.next_since_ms,
            resolution_ms: self.resolution_ms,
            outcome,
        }
    }

    fn stop(self, state: CursorState) -> (Self, Vec<CursorAction>) {
        (Self { state, ..self }, vec![CursorAction::Stop])
    }

    fn request(self) -> (Self, Vec<CursorAction>) {
        if self.task.is_bounded() && self.next_since_ms > self.task.until_ms {
            return self.stop(CursorState::Done);
        }
        let action = CursorAction::Fetch {
            since_ms: self.next_since_ms,
            limit: self.task.limit,
        };
        (
            Self {
                state: CursorState::Paging,
                ..self
            },
            vec![action],
        )
    }

    fn on_fetch_error(mut self, err: OhlcvError) -> (Self, Vec<CursorAction>) {
        if !err.is_transient() {
            return self.stop(CursorState::Failed(err));
        }
        // local quota waits do not count against the retry budget
        if let &OhlcvError::QuotaExceeded { reset_in_ms, .. } = &err {
            let delay_ms = self.retry.jittered(reset_in_ms.max(1));
            return (
                Self {
                    state: CursorState::Backoff {
                        attempt: self.failures,
                    },
                    ..self
                },
                vec![CursorAction::Sleep { delay_ms }],
            );
        }
        self.failures = self.failures.saturating_add(1);
        let attempt = self.failures;
        if self.retry.exhausted(attempt) {
            return self.stop(CursorState::Failed(OhlcvError::RetriesExhausted {
                attempts: attempt,
                last: Box::new(err),
            }));
        }
        let delay_ms = self.retry.delay_ms(attempt, err.retry_after_ms());
        (
            Self {
                state: CursorState::Backoff { attempt },
                ..self
            },
            vec![CursorAction::Sleep { delay_ms }],
        )
    }

    fn on_page(mut self, rows: Vec<Candle>) -> (Self, Vec<CursorAction>) {
        if let Some(pair) = rows.windows(2).find(|w| w[1].ts <= w[0].ts) {
            let err = OhlcvError::malformed(
                self.task.exchange.clone(),
                format!(
                    "{} {}: timestamps not increasing ({} then {})",
                    self.task.symbol, self.task.interval, pair[0].ts, pair[1].ts
                ),
            );
            return self.stop(CursorState::Failed(err));
        }
        self.failures = 0;

        let since = self.next_since_ms;
        let until = self.task.until_ms;
        let bounded = self.task.is_bounded();
        let last_ts = rows.last().map(|c| c.ts);
        if let [.., older, newer] = rows.as_slice() {
            self.last_two = Some((newer.ts, older.ts));
            self.resolution_ms = Some(detect_resolution(newer.ts, older.ts));
        } else if self.resolution_ms.is_none() {
            self.resolution_ms = interval_to_ms(&self.task.interval);
        }

        let kept: Vec<Candle> = rows
            .into_iter()
            .filter(|c| c.ts >= since && (!bounded || c.ts <= until))
            .collect();

        let last_ts = match last_ts {
            Some(ts) if !kept.is_empty() => ts,
            _ if bounded => return self.stop(CursorState::Done),
            _ => {
                let delay_ms = self.poll_interval_ms;
                return (
                    Self {
                        state: CursorState::Polling,
                        ..self
                    },
                    vec![CursorAction::Sleep { delay_ms }],
                );
            }
        };

        let advance_to = self.resolution_ms.map(|r| last_ts.saturating_add(r));
        (
            Self {
                state: CursorState::Writing { advance_to },
                ..self
            },
            vec![CursorAction::Append(kept)],
        )
    }
}
