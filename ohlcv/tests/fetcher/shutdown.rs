use std::time::Duration;

use ohlcv::{Fetcher, TaskOutcome};
use ohlcv_mock::{DynamicMockExchange, MockBehavior};
use tempfile::tempdir;

use crate::helpers::{BTC, HOUR, T0, bars, config, read_series};

#[tokio::test(start_paused = true)]
async fn caught_up_tasks_poll_until_shutdown() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.push_pages(BTC, "1h", [MockBehavior::Return(bars(T0, 3, HOUR))])
        .await;
    let cfg = config(
        dir.path(),
        r#"
        [settings]
        poll_interval_ms = 1000

        [exchanges.dyn]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
    "#,
    );
    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(cfg)
        .build()
        .unwrap();

    // a late page shows up while the task is polling
    let late = ctl.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        late.push_pages(BTC, "1h", [MockBehavior::Return(bars(T0 + 3 * HOUR, 2, HOUR))])
            .await;
    });

    let report = fetcher
        .run_until(tokio::time::sleep(Duration::from_millis(10_500)))
        .await;

    assert!(!report.has_failures());
    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Cancelled);
    assert_eq!(task.rows_written, 5);
    assert_eq!(task.next_since_ms, T0 + 5 * HOUR);

    let requests = ctl.requests_for(BTC, "1h").await;
    // one page, a poll every second, the late page, then polls again
    assert!(requests.len() >= 10);
    assert!(requests.windows(2).all(|w| w[1].since_ms >= w[0].since_ms));
    assert_eq!(read_series(dir.path(), "dyn", BTC, "1h").candles.len(), 5);
    assert_eq!(ctl.close_count().await, 1);
}

#[tokio::test]
async fn shutdown_interrupts_a_stalled_request() {
    let dir = tempdir().unwrap();
    let (exchange, ctl) = DynamicMockExchange::new_with_controller("dyn", &["1h"]);
    ctl.push_pages(BTC, "1h", [MockBehavior::Hang]).await;
    let cfg = config(
        dir.path(),
        r#"
        [exchanges.dyn]
        filter_symbols = ["BTC/USDT"]
        filter_resolutions = ["1h"]
        since = "2019-01-01"
        until = "2019-02-01"
    "#,
    );
    let fetcher = Fetcher::builder()
        .with_exchange(exchange)
        .config(cfg)
        .build()
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let run = fetcher.run_until(async {
        let _ = rx.await;
    });
    tokio::pin!(run);
    tokio::select! {
        _ = &mut run => panic!("run finished before shutdown"),
        () = tokio::time::sleep(Duration::from_millis(50)) => {}
    }
    tx.send(()).unwrap();
    let report = run.await;

    let task = report.tasks().next().unwrap();
    assert_eq!(task.outcome, TaskOutcome::Cancelled);
    assert_eq!(task.next_since_ms, T0);
    assert_eq!(ctl.close_count().await, 1);
}
