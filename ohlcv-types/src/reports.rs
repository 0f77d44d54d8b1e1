//! Report envelopes produced by the fetcher and the integrity checker.

use serde::{Deserialize, Serialize};

use crate::error::OhlcvError;

/// Terminal state of one fetch task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// The bounded window was exhausted or the exchange had no further data.
    Done,
    /// The task stopped on an unrecoverable error.
    Failed(OhlcvError),
    /// The run was shut down, or a sibling task failed, before this task finished.
    Cancelled,
}

/// Summary of one (exchange, symbol, interval) fetch task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Exchange id.
    pub exchange: String,
    /// Market symbol, e.g. `BTC/USDT`.
    pub symbol: String,
    /// Interval label, e.g. `1h`.
    pub interval: String,
    /// Series file the task appended to.
    pub file: String,
    /// Pages successfully written.
    pub pages: u64,
    /// Candles appended across all pages.
    pub rows_written: u64,
    /// Cursor position when the task ended.
    pub next_since_ms: i64,
    /// Last resolution derived from returned rows.
    pub resolution_ms: Option<i64>,
    /// How the task ended.
    pub outcome: TaskOutcome,
}

impl TaskReport {
    /// Whether the task ended in `Failed`.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Failed(_))
    }
}

/// Summary of all tasks for one exchange.
///
/// `error` is set when the exchange's task group aborted as a whole: a failed
/// capability check, an unlisted market set, or the first fatal task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    /// Exchange id.
    pub exchange: String,
    /// Reports of tasks that ran to a terminal state.
    pub tasks: Vec<TaskReport>,
    /// Group-level fatal error, if any.
    pub error: Option<OhlcvError>,
}

/// Summary of a complete fetch run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchReport {
    /// One entry per configured exchange.
    pub exchanges: Vec<ExchangeReport>,
}

impl FetchReport {
    /// Whether any exchange group or task failed fatally.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.exchanges
            .iter()
            .any(|e| e.error.is_some() || e.tasks.iter().any(TaskReport::is_failed))
    }

    /// Every task report, exchange by exchange.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.exchanges.iter().flat_map(|e| e.tasks.iter())
    }

    /// Total candles written across every task.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.tasks().map(|t| t.rows_written).sum()
    }
}

/// Result of checking (and optionally repairing) one series file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Checked file.
    pub path: String,
    /// Rows read from the file.
    pub raw_rows: usize,
    /// Rows dropped because their timestamp was already present.
    pub duplicate_rows: usize,
    /// Rows in the repaired series.
    pub fixed_rows: usize,
    /// Grid points inserted with missing values.
    pub missing_rows: usize,
    /// `missing_rows` as a percentage of `fixed_rows`, two decimals.
    pub missing_pct: f64,
    /// Resolution used for the canonical grid.
    pub resolution_ms: i64,
    /// First timestamp of the series (ms).
    pub first_ts_ms: i64,
    /// Last timestamp of the series (ms).
    pub last_ts_ms: i64,
    /// Destination of the repaired series, if it was written.
    pub written_to: Option<String>,
}
