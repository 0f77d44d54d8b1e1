use std::sync::Arc;
use std::time::Duration;

use ohlcv::{Fetcher, OhlcvError, TaskOutcome};
use ohlcv_mock::{DynamicMockExchange, MockBehavior, MockExchange};
use tempfile::tempdir;

use crate::helpers::{BTC, HOUR, T0, bars, config, read_series};

const CFG: &str = r#"
    [settings.retry]
    min_backoff_ms = 100
    max_backoff_ms = 1000
    factor = 2
    jitter_percent = 0
    max_attempts = 3

    [exchanges.dyn]
    filter_symbols = ["BTC/USDT"]
    filter_resolutions = ["1h"]
    since = "2019-01-01 00:00:00"
    until = "2019-01-01 10:00:00"
    limit = 3
"#;

#[tokio::test(start_paused = true)]
async fn transient_errors_retry_the_same_page() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.set_markets(MockBehavior::Return(vec![BTC.to_string()]))
        .await;
    ctl.push_pages(
        BTC,
        "1h",
        [
            MockBehavior::Fail(OhlcvError::exchange("dyn", "502 bad gateway")),
            MockBehavior::Fail(OhlcvError::Timeout {
                exchange: "dyn".into(),
            }),
            MockBehavior::Return(bars(T0, 3, HOUR)),
            MockBehavior::Return(Vec::new()),
        ],
    )
    .await;

    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(config(dir.path(), CFG))
        .build()
        .unwrap();
    let started = tokio::time::Instant::now();
    let report = fetcher.run().await;

    assert!(!report.has_failures());
    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Done);
    assert_eq!(task.rows_written, 3);

    let since: Vec<i64> = ctl
        .requests_for(BTC, "1h")
        .await
        .iter()
        .map(|r| r.since_ms)
        .collect();
    assert_eq!(since, vec![T0, T0, T0, T0 + 3 * HOUR]);
    // 100 ms then 200 ms of backoff before the successful attempt
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(read_series(dir.path(), "dyn", BTC, "1h").candles, bars(T0, 3, HOUR));
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    let err = OhlcvError::RateLimited {
        exchange: "dyn".into(),
        msg: "too many requests".into(),
    };
    ctl.push_pages(BTC, "1h", std::iter::repeat_n(MockBehavior::Fail(err.clone()), 5))
        .await;

    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(config(dir.path(), CFG))
        .build()
        .unwrap();
    let report = fetcher.run().await;

    assert!(report.has_failures());
    let task = report.tasks().next().unwrap();
    match &task.outcome {
        TaskOutcome::Failed(OhlcvError::RetriesExhausted { attempts, last }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(**last, err);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(task.rows_written, 0);
    assert_eq!(ctl.requests().await.len(), 3);
    assert_eq!(ctl.pending_pages().await, 2);
    assert_eq!(ctl.close_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn quota_exhaustion_waits_for_the_next_window() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.push_pages(
        BTC,
        "1h",
        [
            MockBehavior::Return(bars(T0, 2, HOUR)),
            MockBehavior::Return(bars(T0 + 2 * HOUR, 2, HOUR)),
        ],
    )
    .await;
    let cfg = config(
        dir.path(),
        &format!("{CFG}\n[exchanges.dyn.rate_limit]\nlimit = 1\nwindow_ms = 1000\n"),
    );

    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(cfg)
        .build()
        .unwrap();
    let started = tokio::time::Instant::now();
    let report = fetcher.run().await;

    assert!(!report.has_failures());
    assert_eq!(report.rows_written(), 4);
    // the limiter rejects locally, so the exchange only sees admitted calls
    assert_eq!(ctl.requests_for(BTC, "1h").await.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn shared_quota_smaller_than_the_task_count_only_delays() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [settings.retry]
        min_backoff_ms = 100
        max_backoff_ms = 1000
        jitter_percent = 0
        max_attempts = 2

        [exchanges.mock]
        since = "2019-01-01 00:00:00"
        until = "2019-01-01 02:00:00"
        rate_limit = { limit = 1, window_ms = 1000 }
    "#,
    );

    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .unwrap();
    let started = tokio::time::Instant::now();
    let report = fetcher.run().await;

    // 3 markets x 5 intervals, one admitted request per window
    assert!(!report.has_failures(), "{report:?}");
    assert_eq!(report.tasks().count(), 15);
    assert!(
        report
            .tasks()
            .all(|t| t.outcome == TaskOutcome::Done && t.rows_written > 0)
    );
    assert!(started.elapsed() >= Duration::from_millis(14_000));
}

#[tokio::test(start_paused = true)]
async fn market_listing_failures_abort_the_exchange() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.set_markets(MockBehavior::Fail(OhlcvError::ExchangeUnavailable {
        exchange: "dyn".into(),
        msg: "maintenance".into(),
    }))
    .await;

    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(config(dir.path(), CFG))
        .build()
        .unwrap();
    let report = fetcher.run().await;

    assert!(report.has_failures());
    let ex = &report.exchanges[0];
    assert!(ex.tasks.is_empty());
    assert!(matches!(
        ex.error,
        Some(OhlcvError::RetriesExhausted { attempts: 3, .. })
    ));
    assert!(ctl.requests().await.is_empty());
    assert_eq!(ctl.close_count().await, 1);
}
