use std::sync::Arc;

use ohlcv::{Fetcher, TaskOutcome};
use ohlcv_mock::MockExchange;
use tempfile::tempdir;

use crate::helpers::{BTC, ETH, HOUR, T0, config, read_series, series_exists};

#[tokio::test]
async fn bounded_fetch_pages_through_the_window() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
        until = "2019-01-02 00:00:00"
        limit = 10
    "#,
    );
    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .unwrap();

    let report = fetcher.run().await;
    assert!(!report.has_failures());
    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Done);
    assert_eq!(task.pages, 3);
    assert_eq!(task.rows_written, 25);
    assert_eq!(task.resolution_ms, Some(HOUR));
    assert_eq!(task.next_since_ms, T0 + 30 * HOUR);
    assert!(task.file.ends_with("MOCK_BTCUSDT_1h.csv"));

    let series = read_series(dir.path(), "mock", BTC, "1h");
    assert_eq!(series.len(), 25);
    assert_eq!(series.first_ts(), Some(T0));
    assert_eq!(series.last_ts(), Some(T0 + 24 * HOUR));
    assert!(series.candles.windows(2).all(|w| w[1].ts - w[0].ts == HOUR));
}

#[tokio::test]
async fn empty_filters_expand_to_all_markets_and_intervals() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        since = "2019-01-01"
        until = "2019-01-02"
    "#,
    );
    let exchange = MockExchange::new("mock")
        .with_markets([BTC, ETH])
        .with_intervals(&["1h", "1d"]);
    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(exchange))
        .config(cfg)
        .build()
        .unwrap();

    let report = fetcher.run().await;
    assert!(!report.has_failures());
    let triples: Vec<(&str, &str)> = report
        .tasks()
        .map(|t| (t.symbol.as_str(), t.interval.as_str()))
        .collect();
    assert_eq!(
        triples,
        vec![(BTC, "1d"), (BTC, "1h"), (ETH, "1d"), (ETH, "1h")]
    );
    for symbol in [BTC, ETH] {
        assert_eq!(read_series(dir.path(), "mock", symbol, "1h").len(), 25);
        let daily = read_series(dir.path(), "mock", symbol, "1d");
        assert_eq!(daily.last_two(), Some((T0 + 24 * HOUR, T0)));
    }
    assert_eq!(report.rows_written(), 2 * (25 + 2));
}

#[tokio::test]
async fn rerun_appends_after_existing_rows() {
    let dir = tempdir().unwrap();
    let first = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
        until = "2019-01-01 05:00:00"
    "#,
    );
    let second = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 06:00:00"
        until = "2019-01-01 09:00:00"
    "#,
    );
    for cfg in [first, second] {
        let report = Fetcher::builder()
            .with_exchange(Arc::new(MockExchange::new("mock")))
            .config(cfg)
            .build()
            .unwrap()
            .run()
            .await;
        assert!(!report.has_failures());
    }
    let series = read_series(dir.path(), "mock", BTC, "1h");
    assert_eq!(series.len(), 10);
    assert!(series.candles.windows(2).all(|w| w[1].ts - w[0].ts == HOUR));
}

#[tokio::test(start_paused = true)]
async fn unbounded_fetch_catches_up_then_waits() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-07 20:00:00"
    "#,
    );
    // history ends 2019-01-08 00:00; the task then polls until shut down
    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .unwrap();
    let report = fetcher
        .run_until(tokio::time::sleep(std::time::Duration::from_millis(200)))
        .await;
    assert!(!report.has_failures());
    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Cancelled);
    assert_eq!(task.rows_written, 5);
    assert!(series_exists(dir.path(), "mock", BTC, "1h"));
}

#[tokio::test]
async fn repeated_filter_entries_share_one_task_and_file() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["ETH/BTC", "ETH/BTC"]
        filter_resolutions = ["1h", "1h"]
        since = "2019-01-01 00:00:00"
        until = "2019-01-01 02:00:00"
    "#,
    );
    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .unwrap();

    let report = fetcher.run().await;
    assert!(!report.has_failures());
    assert_eq!(report.tasks().count(), 1);
    assert_eq!(report.rows_written(), 3);

    let ts: Vec<i64> = read_series(dir.path(), "mock", "ETH/BTC", "1h")
        .candles
        .iter()
        .map(|c| c.ts)
        .collect();
    assert_eq!(ts, vec![T0, T0 + HOUR, T0 + 2 * HOUR]);
}

#[test]
fn exchange_blocks_differing_in_case_are_rejected() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        since = "2019-01-01"

        [exchanges.MOCK]
        since = "2019-01-01"
    "#,
    );
    let err = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ohlcv::OhlcvError::Config(_)));
    assert!(!series_exists(dir.path(), "mock", BTC, "1h"));
}
