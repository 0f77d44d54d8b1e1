use std::sync::Arc;

use ohlcv::{Candle, Fetcher, OhlcvError, TaskOutcome};
use ohlcv_mock::{DynamicMockExchange, MockBehavior, MockExchange};
use tempfile::tempdir;

use crate::helpers::{BTC, ETH, HOUR, T0, bars, config, read_series, series_exists};

const TWO_SYMBOLS: &str = r#"
    [exchanges.dyn]
    filter_symbols = ["BTC/USDT", "ETH/USDT"]
    filter_resolutions = ["1h"]
    since = "2019-01-01 00:00:00"
    until = "2019-01-02 00:00:00"
"#;

#[tokio::test]
async fn malformed_page_fails_the_task_without_writing() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    let mut rows = bars(T0, 3, HOUR);
    rows.swap(0, 2);
    ctl.push_pages(BTC, "1h", [MockBehavior::Return(rows)]).await;
    ctl.push_pages(ETH, "1h", [MockBehavior::Hang]).await;

    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(config(dir.path(), TWO_SYMBOLS))
        .build()
        .unwrap();
    let report = fetcher.run().await;

    assert!(report.has_failures());
    let ex = &report.exchanges[0];
    assert!(matches!(ex.error, Some(OhlcvError::MalformedResponse { .. })));
    let outcomes: Vec<(&str, &TaskOutcome)> = ex
        .tasks
        .iter()
        .map(|t| (t.symbol.as_str(), &t.outcome))
        .collect();
    assert!(matches!(
        outcomes[0],
        (BTC, TaskOutcome::Failed(OhlcvError::MalformedResponse { .. }))
    ));
    // the stalled sibling is cancelled once the first task fails
    assert_eq!(outcomes[1], (ETH, &TaskOutcome::Cancelled));
    assert!(!series_exists(dir.path(), "dyn", BTC, "1h"));
    assert_eq!(ctl.close_count().await, 1);
}

#[tokio::test]
async fn connector_parse_errors_are_fatal() {
    let dir = tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.mock]
        filter_symbols = ["BADCOIN/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01"
    "#,
    );
    let fetcher = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .config(cfg)
        .build()
        .unwrap();
    let report = fetcher.run().await;
    let task = report.tasks().next().unwrap();
    assert!(matches!(
        task.outcome,
        TaskOutcome::Failed(OhlcvError::MalformedResponse { .. })
    ));
    assert_eq!(task.pages, 0);
}

#[tokio::test]
async fn exchange_without_candles_fails_before_any_request() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::without_candles("dyn", &["1h"]);
    ctl.set_markets(MockBehavior::Return(vec![BTC.into(), ETH.into()]))
        .await;
    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(config(dir.path(), TWO_SYMBOLS))
        .build()
        .unwrap();
    let report = fetcher.run().await;

    assert!(report.has_failures());
    let ex = &report.exchanges[0];
    assert!(ex.tasks.is_empty());
    match &ex.error {
        Some(OhlcvError::Unsupported { exchange, capability }) => {
            assert_eq!(exchange, "dyn");
            assert_eq!(capability, "candles");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(ctl.requests().await.is_empty());
    assert_eq!(ctl.close_count().await, 1);
}

#[tokio::test]
async fn unsupported_interval_fails_the_exchange() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h", "1d"]);
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.dyn]
        filter_resolutions = ["1h", "7m"]
        since = "2019-01-01"
    "#,
    );
    let report = Fetcher::builder()
        .with_exchange(exchange)
        .config(cfg)
        .build()
        .unwrap()
        .run()
        .await;

    match &report.exchanges[0].error {
        Some(OhlcvError::Unsupported { capability, .. }) => assert_eq!(capability, "interval 7m"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(ctl.requests().await.is_empty());
}

#[tokio::test]
async fn failing_exchange_does_not_affect_others() {
    let dir = tempdir().unwrap();
    let (broken, _) = DynamicMockExchange::without_candles("broken", &["1h"]);
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.broken]
        since = "2019-01-01"

        [exchanges.mock]
        filter_symbols = ["ETH/BTC"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
        until = "2019-01-01 02:00:00"
    "#,
    );
    let report = Fetcher::builder()
        .with_exchange(Arc::new(MockExchange::new("mock")))
        .with_exchange(broken)
        .config(cfg)
        .build()
        .unwrap()
        .run()
        .await;

    assert!(report.has_failures());
    let by_id: Vec<(&str, bool)> = report
        .exchanges
        .iter()
        .map(|e| (e.exchange.as_str(), e.error.is_some()))
        .collect();
    assert_eq!(by_id, vec![("broken", true), ("mock", false)]);
    let series = read_series(dir.path(), "mock", "ETH/BTC", "1h");
    assert_eq!(series.len(), 3);
}

#[tokio::test]
async fn single_row_pages_advance_by_the_interval_width() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.push_pages(
        BTC,
        "1h",
        [
            MockBehavior::Return(vec![Candle::new(T0, 1.0, 1.0, 1.0, 1.0, 1.0)]),
            MockBehavior::Return(vec![Candle::new(T0 + HOUR, 2.0, 2.0, 2.0, 2.0, 2.0)]),
        ],
    )
    .await;
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.dyn]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
        until = "2019-01-01 01:00:00"
    "#,
    );
    let report = Fetcher::builder()
        .with_exchange(exchange)
        .config(cfg)
        .build()
        .unwrap()
        .run()
        .await;

    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Done);
    assert_eq!(task.pages, 2);
    assert_eq!(task.next_since_ms, T0 + 2 * HOUR);
    let since: Vec<i64> = ctl.requests().await.iter().map(|r| r.since_ms).collect();
    assert_eq!(since, vec![T0, T0 + HOUR]);
}
