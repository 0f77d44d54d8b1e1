use std::sync::Arc;

use ohlcv::{Fetcher, FetcherConfig, TaskOutcome, ms_to_datetime};
use ohlcv_mock::MockExchange;
use proptest::prelude::*;
use tempfile::tempdir;

use crate::helpers::{BTC, HOUR, T0, read_series};

fn window_config(dir: &std::path::Path, hours: i64, limit: u32) -> FetcherConfig {
    let mut cfg = FetcherConfig::default();
    cfg.settings.output_dir = dir.display().to_string();
    let until = ms_to_datetime(T0 + hours * HOUR)
        .unwrap()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let doc = format!(
        r#"
        [exchanges.mock]
        filter_symbols = ["{BTC}"]
        filter_resolutions = ["1h"]
        since = "2019-01-01 00:00:00"
        until = "{until}"
        limit = {limit}
    "#
    );
    cfg.exchanges = FetcherConfig::from_toml_str(&doc).unwrap().exchanges;
    cfg
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn bounded_fetch_writes_the_window_exactly_once(hours in 0_i64..72, limit in 1_u32..40) {
        let dir = tempdir().unwrap();
        let fetcher = Fetcher::builder()
            .with_exchange(Arc::new(MockExchange::new("mock")))
            .config(window_config(dir.path(), hours, limit))
            .build()
            .unwrap();
        let report = tokio_test::block_on(fetcher.run());

        let task = report.tasks().next().unwrap();
        prop_assert_eq!(&task.outcome, &TaskOutcome::Done);
        let expected = u64::try_from(hours + 1).unwrap();
        prop_assert_eq!(task.rows_written, expected);
        prop_assert!(task.next_since_ms > T0 + hours * HOUR);

        let series = read_series(dir.path(), "mock", BTC, "1h");
        prop_assert_eq!(series.first_ts(), Some(T0));
        prop_assert_eq!(series.last_ts(), Some(T0 + hours * HOUR));
        prop_assert!(series.candles.windows(2).all(|w| w[1].ts - w[0].ts == HOUR));
    }
}
