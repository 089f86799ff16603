//! Fixed-interval tick loop
//!
//! Each tick samples one price, builds one command and hands it to the
//! submission pipeline without waiting for it. The loop only ever waits on the
//! fetch, and that wait is bounded by the fetch timeout.

use crate::config::FeederConfig;
use crate::isolation::guarded_fetch;
use crate::pipeline::{SubmissionPipeline, SubmissionTask};
use crate::runner::CommandRunner;
use crate::stats::{FeederStats, FeederStatsSnapshot};
use feeder_rust_core::clients::PriceSource;
use feeder_rust_core::command::CommandBuilder;
use feeder_rust_core::models::AssetConfig;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    Idle,
    Cycling,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Submitted { price: f64, scaled_price: u64 },
    FetchFailed(String),
    InvalidPrice(String),
    NotEnqueued(String),
}

pub struct Feeder {
    asset: AssetConfig,
    source: Arc<dyn PriceSource>,
    builder: CommandBuilder,
    pipeline: SubmissionPipeline,
    stats: Arc<FeederStats>,
    interval: Duration,
    fetch_timeout: Duration,
    stats_every: u64,
    cycling: AtomicBool,
}

impl Feeder {
    pub fn new(
        asset: AssetConfig,
        source: Arc<dyn PriceSource>,
        builder: CommandBuilder,
        pipeline: SubmissionPipeline,
        stats: Arc<FeederStats>,
    ) -> Self {
        Self {
            asset,
            source,
            builder,
            pipeline,
            stats,
            interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            stats_every: 12,
            cycling: AtomicBool::new(false),
        }
    }

    /// Wire a feeder from the run configuration. Starts the pipeline workers.
    pub fn from_config(
        config: &FeederConfig,
        asset: AssetConfig,
        source: Arc<dyn PriceSource>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let stats = Arc::new(FeederStats::new());
        let builder = CommandBuilder::new(config.client_params()).with_max_price(config.max_price);
        let pipeline = SubmissionPipeline::start(
            config.max_concurrent,
            config.queue_capacity,
            config.submit_timeout(),
            runner,
            stats.clone(),
        );

        Self::new(asset, source, builder, pipeline, stats)
            .with_interval(config.interval())
            .with_fetch_timeout(config.fetch_timeout())
            .with_stats_every(config.stats_every_ticks)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_stats_every(mut self, ticks: u64) -> Self {
        self.stats_every = ticks.max(1);
        self
    }

    pub fn asset(&self) -> &AssetConfig {
        &self.asset
    }

    pub fn state(&self) -> FeederState {
        if self.cycling.load(Ordering::SeqCst) {
            FeederState::Cycling
        } else {
            FeederState::Idle
        }
    }

    pub fn stats(&self) -> Arc<FeederStats> {
        self.stats.clone()
    }

    /// Run one fetch-build-submit cycle. Never fails: every error becomes a
    /// skipped tick.
    pub async fn tick(&self) -> TickOutcome {
        self.cycling.store(true, Ordering::SeqCst);
        let tick = self.stats.record_tick();
        let outcome = self.cycle(tick).await;
        self.cycling.store(false, Ordering::SeqCst);
        outcome
    }

    async fn cycle(&self, tick: u64) -> TickOutcome {
        let symbol = self.asset.symbol.as_str();

        let quote = match guarded_fetch(self.source.as_ref(), &self.asset, self.fetch_timeout).await {
            Ok(quote) => quote,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    tick,
                    symbol,
                    provider_status = ?self.source.status(),
                    "Price fetch failed, skipping tick: {}",
                    e
                );
                return TickOutcome::FetchFailed(e.to_string());
            }
        };

        if !(quote.price > 0.0) {
            self.stats.invalid_prices.fetch_add(1, Ordering::Relaxed);
            warn!(
                tick,
                symbol,
                price = quote.price,
                "Non-positive price from {}, skipping tick",
                quote.source
            );
            return TickOutcome::InvalidPrice(format!("non-positive price {}", quote.price));
        }

        let command = match self.builder.build(&self.asset, quote.price) {
            Ok(command) => command,
            Err(e) => {
                self.stats.invalid_prices.fetch_add(1, Ordering::Relaxed);
                warn!(tick, symbol, "Cannot build update, skipping tick: {}", e);
                return TickOutcome::InvalidPrice(e.to_string());
            }
        };

        let scaled_price = command.scaled_price.value();
        info!(
            tick,
            symbol,
            price = quote.price,
            scaled_price,
            source = %quote.source,
            "Sampled price"
        );
        debug!(tick, command = %command, "Built update command");

        match self.pipeline.submit(SubmissionTask::new(command, symbol, tick)) {
            Ok(()) => TickOutcome::Submitted {
                price: quote.price,
                scaled_price,
            },
            Err(e) => {
                warn!(tick, symbol, "Update not enqueued: {}", e);
                TickOutcome::NotEnqueued(e.to_string())
            }
        }
    }

    /// Tick until `shutdown` resolves, then drain the pipeline.
    pub async fn run_until<F>(self, shutdown: F) -> FeederStatsSnapshot
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            symbol = %self.asset.symbol,
            source = self.source.source_name(),
            "Feeder running (interval: {:?}, fetch timeout: {:?}, max concurrent: {})",
            self.interval,
            self.fetch_timeout,
            self.pipeline.max_concurrent()
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping tick loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;

                    let snapshot = self.stats.snapshot();
                    if snapshot.ticks % self.stats_every == 0 {
                        log_stats(&snapshot);
                    }
                }
            }
        }

        let stats = self.stats.clone();
        self.pipeline.shutdown().await;
        stats.snapshot()
    }
}

pub fn log_stats(snapshot: &FeederStatsSnapshot) {
    info!(
        "Feeder stats: ticks={}, fetch_failures={}, invalid_prices={}, enqueued={}, succeeded={}, failed={}, dropped={}, peak_concurrency={}",
        snapshot.ticks,
        snapshot.fetch_failures,
        snapshot.invalid_prices,
        snapshot.submissions_enqueued,
        snapshot.submissions_succeeded,
        snapshot.submissions_failed,
        snapshot.submissions_dropped,
        snapshot.peak_in_flight
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use async_trait::async_trait;
    use feeder_rust_core::clients::StablePegSource;
    use feeder_rust_core::command::{ClientParams, CommandDescription};
    use feeder_rust_core::error::{FeederError, Result};
    use feeder_rust_core::models::Quote;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    /// Fails on odd calls, returns `price` on even ones
    struct FlakySource {
        calls: AtomicU64,
        price: f64,
    }

    #[async_trait]
    impl PriceSource for FlakySource {
        fn source_name(&self) -> &str {
            "Flaky"
        }

        fn supports(&self, _asset: &AssetConfig) -> bool {
            true
        }

        async fn fetch(&self, _asset: &AssetConfig) -> Result<Quote> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call % 2 == 1 {
                Err(FeederError::source_error("Flaky", "connection reset"))
            } else {
                Ok(Quote::now(self.price, "Flaky"))
            }
        }
    }

    struct FixedSource(f64);

    #[async_trait]
    impl PriceSource for FixedSource {
        fn source_name(&self) -> &str {
            "Fixed"
        }

        fn supports(&self, _asset: &AssetConfig) -> bool {
            true
        }

        async fn fetch(&self, _asset: &AssetConfig) -> Result<Quote> {
            Ok(Quote::now(self.0, "Fixed"))
        }
    }

    struct HangingSource;

    #[async_trait]
    impl PriceSource for HangingSource {
        fn source_name(&self) -> &str {
            "Hanging"
        }

        fn supports(&self, _asset: &AssetConfig) -> bool {
            true
        }

        async fn fetch(&self, _asset: &AssetConfig) -> Result<Quote> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Quote::now(1.0, "Hanging"))
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<CommandDescription>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &CommandDescription) -> Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.clone());
            Ok(CommandOutput::default())
        }
    }

    fn make_feeder(source: Arc<dyn PriceSource>, runner: Arc<RecordingRunner>) -> Feeder {
        let stats = Arc::new(FeederStats::new());
        let pipeline =
            SubmissionPipeline::start(2, 16, Duration::from_secs(30), runner, stats.clone());
        let builder = CommandBuilder::new(ClientParams::new("feeder.yaml", 2_000_000));
        let asset = AssetConfig::new("usdt", 9, "0xpkg", "0xfeeder");
        Feeder::new(asset, source, builder, pipeline, stats)
            .with_interval(Duration::from_secs(10))
            .with_fetch_timeout(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_keeps_ticking_on_schedule() {
        let source = Arc::new(FlakySource {
            calls: AtomicU64::new(0),
            price: 1.0,
        });
        let runner = Arc::new(RecordingRunner::default());
        let feeder = make_feeder(source.clone(), runner.clone());

        // Ticks at 0s, 10s, 20s, 30s
        let snapshot = feeder
            .run_until(tokio::time::sleep(Duration::from_secs(35)))
            .await;

        assert_eq!(snapshot.ticks, 4);
        assert_eq!(snapshot.fetch_failures, 2);
        assert_eq!(snapshot.submissions_succeeded, 2);
        assert_eq!(runner.commands.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tick_outcomes_alternate_with_source() {
        let source = Arc::new(FlakySource {
            calls: AtomicU64::new(0),
            price: 2.5,
        });
        let feeder = make_feeder(source, Arc::new(RecordingRunner::default()));

        assert!(matches!(feeder.tick().await, TickOutcome::FetchFailed(_)));
        assert_eq!(
            feeder.tick().await,
            TickOutcome::Submitted {
                price: 2.5,
                scaled_price: 2_500_000_000
            }
        );
        assert!(matches!(feeder.tick().await, TickOutcome::FetchFailed(_)));
        assert_eq!(feeder.state(), FeederState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_is_bounded() {
        let feeder = make_feeder(Arc::new(HangingSource), Arc::new(RecordingRunner::default()));

        let started = tokio::time::Instant::now();
        let outcome = feeder.tick().await;

        assert!(matches!(outcome, TickOutcome::FetchFailed(ref e) if e.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(feeder.stats().snapshot().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_non_positive_price_is_not_submitted() {
        let runner = Arc::new(RecordingRunner::default());
        let feeder = make_feeder(Arc::new(FixedSource(0.0)), runner.clone());
        assert!(matches!(feeder.tick().await, TickOutcome::InvalidPrice(_)));

        let feeder = make_feeder(Arc::new(FixedSource(-3.0)), runner.clone());
        assert!(matches!(feeder.tick().await, TickOutcome::InvalidPrice(_)));

        let snapshot = feeder.run_until(async {}).await;
        assert_eq!(snapshot.submissions_enqueued, 0);
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stable_usdt_command() {
        let runner = Arc::new(RecordingRunner::default());
        let feeder = make_feeder(Arc::new(StablePegSource::new()), runner.clone());

        assert!(matches!(feeder.tick().await, TickOutcome::Submitted { .. }));
        feeder.run_until(async {}).await;

        let commands = runner.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        let scaled: u64 = commands[0].call_args.last().unwrap().parse().unwrap();
        assert!((1_000_000_000..1_000_100_000).contains(&scaled));
        assert_eq!(commands[0].call_args[2], "9");
    }

    #[tokio::test]
    async fn test_full_queue_reports_not_enqueued() {
        struct Blocking;

        #[async_trait]
        impl CommandRunner for Blocking {
            async fn run(&self, _command: &CommandDescription) -> Result<CommandOutput> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(CommandOutput::default())
            }
        }

        let stats = Arc::new(FeederStats::new());
        let pipeline =
            SubmissionPipeline::start(1, 1, Duration::from_millis(200), Arc::new(Blocking), stats.clone());
        let feeder = Feeder::new(
            AssetConfig::new("btc", 9, "0xpkg", "0xfeeder"),
            Arc::new(FixedSource(64_000.0)),
            CommandBuilder::new(ClientParams::new("feeder.yaml", 1000)),
            pipeline,
            stats,
        );

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(feeder.tick().await);
        }
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, TickOutcome::NotEnqueued(_))));

        // Queued work times out and drains
        let snapshot = feeder.run_until(async {}).await;
        assert!(snapshot.submissions_dropped >= 1);
        assert_eq!(snapshot.in_flight, 0);
    }
}
