use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use stock_core::{ConsensusEngine, ProviderRegistry, ProviderResults, SnapshotStore};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::unix_now_ms;
use crate::events::{CycleOutcome, CycleStage};
use crate::fetch::{fetch_provider, HttpFetch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub stages: Vec<CycleStage>,
    pub valid_providers: usize,
    pub total_providers: usize,
    pub outcome: CycleOutcome,
    pub elapsed: Duration,
}

/// Drives poll cycles: fetch every provider concurrently, record their
/// results, reconcile, publish.
///
/// The poller is the only writer of the provider map. Cycles run one at a
/// time; ticks that fire while a cycle is still running are skipped.
pub struct Poller<C> {
    client: C,
    registry: Arc<ProviderRegistry>,
    store: Arc<SnapshotStore>,
    engine: ConsensusEngine,
    config: PollerConfig,
    cycle: u64,
}

impl<C: HttpFetch> Poller<C> {
    pub fn new(
        client: C,
        registry: Arc<ProviderRegistry>,
        store: Arc<SnapshotStore>,
        engine: ConsensusEngine,
        config: PollerConfig,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            engine,
            config,
            cycle: 0,
        }
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    /// Runs one full cycle. `now_ms` is the cycle's reference time: it
    /// stamps failed results and fills in missing timestamps.
    pub async fn run_cycle(&mut self, now_ms: u64) -> CycleReport {
        self.cycle = self.cycle.saturating_add(1);
        let started = Instant::now();
        let mut stages = vec![CycleStage::Fetching];

        let fetches = self
            .registry
            .iter()
            .map(|spec| fetch_provider(&self.client, spec, self.config.fetch_timeout, now_ms));
        let settled = join_all(fetches).await;
        stages.push(CycleStage::Settled);

        let total_providers = settled.len();
        let valid_providers = settled.iter().filter(|result| result.is_valid).count();
        let results: ProviderResults = settled
            .into_iter()
            .map(|result| (result.provider_id.clone(), result))
            .collect();
        self.store.replace_providers(results);

        stages.push(CycleStage::Aggregating);
        let providers = self.store.providers();
        let in_registry_order = self
            .registry
            .iter()
            .filter_map(|spec| providers.get(&spec.id));

        let outcome = match self.engine.resolve(in_registry_order, now_ms) {
            Some(snapshot) => {
                let source = snapshot.source.clone();
                let published_at_ms = now_ms.saturating_add(elapsed_ms(started));
                self.store.publish(snapshot, published_at_ms);
                stages.push(CycleStage::Published);
                CycleOutcome::Published(source)
            }
            None => {
                stages.push(CycleStage::Retained);
                CycleOutcome::Retained
            }
        };

        let report = CycleReport {
            cycle: self.cycle,
            stages,
            valid_providers,
            total_providers,
            outcome,
            elapsed: started.elapsed(),
        };

        match &report.outcome {
            CycleOutcome::Published(source) => info!(
                cycle = report.cycle,
                valid = report.valid_providers,
                total = report.total_providers,
                source = %source,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "snapshot published"
            ),
            CycleOutcome::Retained => info!(
                cycle = report.cycle,
                total = report.total_providers,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "no valid providers, keeping previous snapshot"
            ),
        }

        report
    }

    /// Polls until `shutdown` fires. The first cycle starts immediately.
    /// An in-flight cycle always runs to completion.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            providers = self.registry.len(),
            interval_ms = self.config.interval.as_millis() as u64,
            fetch_timeout_ms = self.config.fetch_timeout.as_millis() as u64,
            freshness = self.engine.policy().enabled(),
            "poller starting"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(cycles = self.cycle, "poller shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let report = self.run_cycle(unix_now_ms()).await;
                    debug!(
                        cycle = report.cycle,
                        stage = report.stages.last().map_or("none", |stage| stage.as_str()),
                        "cycle finished"
                    );
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
