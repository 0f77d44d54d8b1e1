use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use ohlcv_core::{CandleRequest, ExchangeConnector, SeriesStore, TaskReport};

use super::cursor::{CursorAction, CursorEvent, CursorState, FetchCursor};

/// Resolve once `rx` carries `true`; never resolves if the sender is gone.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Drive one cursor to a terminal state against a connector and a store.
pub(crate) async fn drive(
    cursor: FetchCursor,
    connector: Arc<dyn ExchangeConnector>,
    store: SeriesStore,
    mut cancel: watch::Receiver<bool>,
) -> TaskReport {
    let (mut cursor, first) = cursor.handle(CursorEvent::Start);
    let mut queue: VecDeque<CursorAction> = first.into();

    while let Some(action) = queue.pop_front() {
        let event = match action {
            CursorAction::Stop => break,
            CursorAction::Fetch { since_ms, limit } => {
                let task = cursor.task();
                let req = CandleRequest::new(&task.symbol, &task.interval, since_ms, limit)
                    .with_proxy(task.proxies.pick());
                debug!(since_ms, limit, proxied = req.proxy.is_some(), "fetching page");
                tokio::select! {
                    () = cancelled(&mut cancel) => CursorEvent::Cancel,
                    res = connector.fetch_candles(&req) => match res {
                        Ok(rows) => {
                            debug!(rows = rows.len(), "page received");
                            CursorEvent::PageFetched(rows)
                        }
                        Err(e) => {
                            if e.is_transient() {
                                warn!(error = %e, since_ms, "transient fetch error");
                            }
                            CursorEvent::FetchFailed(e)
                        }
                    },
                }
            }
            CursorAction::Append(rows) => match store.write(&rows) {
                Ok(n) => CursorEvent::Written { rows: n },
                Err(e) => CursorEvent::WriteFailed(e),
            },
            CursorAction::Sleep { delay_ms } => {
                if let CursorState::Backoff { attempt } = cursor.state() {
                    debug!(attempt, delay_ms, "backing off");
                }
                tokio::select! {
                    () = cancelled(&mut cancel) => CursorEvent::Cancel,
                    () = tokio::time::sleep(Duration::from_millis(delay_ms)) => CursorEvent::Woke,
                }
            }
        };
        let (next, actions) = cursor.handle(event);
        cursor = next;
        queue.extend(actions);
    }

    let file = store.path().display().to_string();
    cursor.into_report(file)
}
