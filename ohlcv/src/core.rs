use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use ohlcv_core::{
    Capability, ExchangeConfig, ExchangeConnector, ExchangeReport, FetchReport, FetcherConfig,
    OhlcvError, SeriesStore, TaskOutcome, WriteOptions, parse_datetime_ms, series_file_name,
};
use ohlcv_middleware::ConnectorBuilder;

use crate::fetch::task::{cancelled, drive};
use crate::fetch::{FetchCursor, FetchTask, ProxyPool, RetryPolicy};

/// One configured exchange resolved against its connector.
pub(crate) struct ExchangePlan {
    pub(crate) connector: Arc<dyn ExchangeConnector>,
    pub(crate) cfg: ExchangeConfig,
    pub(crate) since_ms: i64,
    pub(crate) until_ms: i64,
}

/// Orchestrator that pages candle history for every configured
/// (exchange, symbol, interval) triple.
pub struct Fetcher {
    pub(crate) plans: Vec<ExchangePlan>,
    pub(crate) proxies: ProxyPool,
    pub(crate) retry: RetryPolicy,
    pub(crate) output_dir: PathBuf,
    pub(crate) delimiter: u8,
    pub(crate) poll_interval_ms: u64,
}

/// Builder for a [`Fetcher`]: the registry of exchange connectors plus the
/// configuration document they are resolved against.
pub struct FetcherBuilder {
    connectors: Vec<Arc<dyn ExchangeConnector>>,
    config: FetcherConfig,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherBuilder {
    /// Create a builder with no connectors and an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connectors: vec![],
            config: FetcherConfig::default(),
        }
    }

    /// Register an exchange connector.
    ///
    /// Behavior and trade-offs:
    /// - Connectors are matched to `[exchanges.<id>]` blocks by their `id()`,
    ///   ignoring case.
    /// - Registering a connector that no block names is harmless; it is never used.
    /// - When two connectors share an id the first registered one wins.
    #[must_use]
    pub fn with_exchange(mut self, c: Arc<dyn ExchangeConnector>) -> Self {
        self.connectors.push(c);
        self
    }

    /// Set the configuration document.
    #[must_use]
    pub fn config(mut self, config: FetcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the configuration against the registered connectors.
    ///
    /// # Errors
    /// Returns `OhlcvError::Config` if the document is invalid, names no
    /// exchange, names an exchange without a registered connector, selects one
    /// connector from two blocks (ids differing only in case), or carries an
    /// unparsable `since`/`until`.
    pub fn build(self) -> Result<Fetcher, OhlcvError> {
        let Self { connectors, config } = self;
        config.validate()?;
        if config.exchanges.is_empty() {
            return Err(OhlcvError::config("no exchanges configured"));
        }

        let mut plans: Vec<ExchangePlan> = Vec::with_capacity(config.exchanges.len());
        let mut block_ids: Vec<String> = Vec::with_capacity(config.exchanges.len());
        for (id, cfg) in config.exchanges {
            let raw = connectors
                .iter()
                .find(|c| c.key().matches(&id))
                .cloned()
                .ok_or_else(|| {
                    OhlcvError::config(format!("no connector registered for exchange '{id}'"))
                })?;
            // one connector per block keeps every series file owned by one task
            if let Some(pos) = plans.iter().position(|p| p.connector.id() == raw.id()) {
                return Err(OhlcvError::config(format!(
                    "exchanges.{} and exchanges.{id} both select connector '{}'",
                    block_ids[pos],
                    raw.id()
                )));
            }
            let since_ms = parse_datetime_ms(&cfg.since)
                .map_err(|e| OhlcvError::config(format!("exchanges.{id}.since: {e}")))?;
            let until_ms = if cfg.until.trim().is_empty() {
                0
            } else {
                parse_datetime_ms(&cfg.until)
                    .map_err(|e| OhlcvError::config(format!("exchanges.{id}.until: {e}")))?
            };
            let connector = ConnectorBuilder::new(raw).with_quota(cfg.rate_limit).build();
            plans.push(ExchangePlan {
                connector,
                cfg,
                since_ms,
                until_ms,
            });
            block_ids.push(id);
        }

        let settings = config.settings;
        Ok(Fetcher {
            plans,
            proxies: ProxyPool::new(settings.proxies.iter().cloned()),
            retry: RetryPolicy::new(settings.retry),
            output_dir: PathBuf::from(&settings.output_dir),
            delimiter: settings.delimiter_byte()?,
            poll_interval_ms: settings.poll_interval_ms,
        })
    }
}

impl Fetcher {
    /// Start building a new fetcher.
    #[must_use]
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// Ids of the exchanges this fetcher will run, ordered by configuration id.
    pub fn exchanges(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plans.iter().map(|p| p.connector.id())
    }

    /// Run every exchange group to completion.
    ///
    /// Unbounded tasks (`until` empty) never complete on their own; use
    /// [`run_until`](Self::run_until) to stop them.
    pub async fn run(&self) -> FetchReport {
        self.run_until(std::future::pending()).await
    }

    /// Run every exchange group until completion or until `shutdown` resolves.
    ///
    /// Behavior and trade-offs:
    /// - Exchanges run concurrently, and so do the tasks within one exchange.
    ///   Tasks are polled on the calling task; no runtime threads are required.
    /// - On shutdown every task stops at its next suspension point and reports
    ///   `Cancelled`. Pages already appended stay on disk, and a page being
    ///   written is finished first.
    /// - Connections are closed after each exchange's tasks end.
    pub async fn run_until<F>(&self, shutdown: F) -> FetchReport
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = watch::channel(false);
        let groups = futures::future::join_all(
            self.plans
                .iter()
                .map(|plan| self.run_exchange(plan, rx.clone())),
        );
        tokio::pin!(groups);
        let exchanges = tokio::select! {
            reports = &mut groups => reports,
            () = shutdown => {
                info!("shutdown requested, cancelling fetch tasks");
                tx.send_replace(true);
                groups.await
            }
        };
        FetchReport { exchanges }
    }

    #[tracing::instrument(
        name = "exchange",
        skip_all,
        fields(exchange = plan.connector.id()),
    )]
    async fn run_exchange(
        &self,
        plan: &ExchangePlan,
        shutdown: watch::Receiver<bool>,
    ) -> ExchangeReport {
        let report = self.run_group(plan, shutdown).await;
        if let Err(e) = plan.connector.close().await {
            warn!(error = %e, "closing exchange connection failed");
        }
        report
    }

    async fn run_group(
        &self,
        plan: &ExchangePlan,
        mut shutdown: watch::Receiver<bool>,
    ) -> ExchangeReport {
        let exchange = plan.connector.id();
        let mut report = ExchangeReport {
            exchange: exchange.to_string(),
            tasks: Vec::new(),
            error: None,
        };

        if let Err(e) = check_capabilities(plan) {
            error!(error = %e, "capability check failed");
            report.error = Some(e);
            return report;
        }

        let markets = match self.load_markets(plan, &mut shutdown).await {
            Ok(Some(markets)) => markets,
            Ok(None) => return report,
            Err(e) => {
                error!(error = %e, "loading markets failed");
                report.error = Some(e);
                return report;
            }
        };

        let tasks = self.expand_tasks(plan, &markets);
        if tasks.is_empty() {
            warn!("nothing to fetch");
            return report;
        }
        info!(tasks = tasks.len(), "starting fetch tasks");

        let (group_tx, group_rx) = watch::channel(false);
        let mut running: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| {
                let span = info_span!(
                    "fetch",
                    exchange = %task.exchange,
                    symbol = %task.symbol,
                    interval = %task.interval,
                );
                let file = self.output_dir.join(series_file_name(
                    &task.exchange,
                    &task.symbol,
                    &task.interval,
                ));
                let store = SeriesStore::new(file, WriteOptions::append(self.delimiter));
                let cursor = FetchCursor::new(task, self.retry, self.poll_interval_ms);
                drive(cursor, Arc::clone(&plan.connector), store, group_rx.clone())
                    .instrument(span)
            })
            .collect();

        let mut stopping = false;
        loop {
            tokio::select! {
                next = running.next() => {
                    let Some(task) = next else { break };
                    if let TaskOutcome::Failed(e) = &task.outcome {
                        error!(symbol = %task.symbol, interval = %task.interval, error = %e, "fetch task failed");
                        if report.error.is_none() {
                            report.error = Some(e.clone());
                            group_tx.send_replace(true);
                            stopping = true;
                        }
                    } else {
                        info!(
                            symbol = %task.symbol,
                            interval = %task.interval,
                            pages = task.pages,
                            rows = task.rows_written,
                            outcome = ?task.outcome,
                            "fetch task finished"
                        );
                    }
                    report.tasks.push(task);
                }
                () = cancelled(&mut shutdown), if !stopping => {
                    group_tx.send_replace(true);
                    stopping = true;
                }
            }
        }

        report
            .tasks
            .sort_by(|a, b| (&a.symbol, &a.interval).cmp(&(&b.symbol, &b.interval)));
        report
    }

    /// List markets, retrying transient failures. `Ok(None)` means shutdown
    /// was requested while waiting.
    async fn load_markets(
        &self,
        plan: &ExchangePlan,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<Vec<String>>, OhlcvError> {
        let mut failures = 0_u32;
        loop {
            let err = match plan.connector.load_markets().await {
                Ok(markets) => {
                    debug!(markets = markets.len(), "markets loaded");
                    return Ok(Some(markets));
                }
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            failures += 1;
            if self.retry.exhausted(failures) {
                return Err(OhlcvError::RetriesExhausted {
                    attempts: failures,
                    last: Box::new(err),
                });
            }
            let delay_ms = self.retry.delay_ms(failures, err.retry_after_ms());
            warn!(error = %err, attempt = failures, delay_ms, "loading markets failed, retrying");
            tokio::select! {
                () = cancelled(shutdown) => return Ok(None),
                () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
        }
    }

    /// One task per distinct (symbol, interval), in first-seen order.
    fn expand_tasks(&self, plan: &ExchangePlan, markets: &[String]) -> Vec<FetchTask> {
        let exchange = plan.connector.id();
        let symbols = if plan.cfg.filter_symbols.is_empty() {
            distinct(markets.iter().cloned())
        } else {
            for s in &plan.cfg.filter_symbols {
                if !markets.contains(s) {
                    warn!(symbol = %s, "configured symbol is not listed by the exchange");
                }
            }
            distinct(plan.cfg.filter_symbols.iter().cloned())
        };
        let intervals = if plan.cfg.filter_resolutions.is_empty() {
            distinct(
                plan.connector
                    .supported_intervals()
                    .iter()
                    .map(ToString::to_string),
            )
        } else {
            distinct(plan.cfg.filter_resolutions.iter().cloned())
        };

        symbols
            .iter()
            .flat_map(|symbol| {
                intervals.iter().map(move |interval| FetchTask {
                    exchange: exchange.to_string(),
                    symbol: symbol.clone(),
                    interval: interval.clone(),
                    since_ms: plan.since_ms,
                    until_ms: plan.until_ms,
                    limit: plan.cfg.limit,
                    proxies: self.proxies.clone(),
                })
            })
            .collect()
    }
}

fn distinct(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.clone());
            if !fresh {
                debug!(entry = %item, "ignoring repeated entry");
            }
            fresh
        })
        .collect()
}

fn check_capabilities(plan: &ExchangePlan) -> Result<(), OhlcvError> {
    let connector = &plan.connector;
    if !connector.has_candle_endpoint() {
        return Err(OhlcvError::unsupported(
            connector.id(),
            Capability::Candles.to_string(),
        ));
    }
    let supported = connector.supported_intervals();
    if let Some(bad) = plan
        .cfg
        .filter_resolutions
        .iter()
        .find(|r| !supported.contains(&r.as_str()))
    {
        return Err(OhlcvError::unsupported(
            connector.id(),
            format!("{} {bad}", Capability::Interval),
        ));
    }
    Ok(())
}
