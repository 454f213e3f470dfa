//! Benchmark tick loop
//!
//! Owns the pool, the controller, the trigger client and the reporter, and
//! runs one controller tick per configured period until told to stop.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::controller::{PhaseController, TickOutcome};
use crate::error::BenchError;
use crate::pool::{AggregateCounters, ConnectionPool};
use crate::reporter::MetricsReporter;
use crate::trigger::{Broadcaster, HttpBroadcaster};

pub struct Benchmark<W: Write> {
    config: Config,
    message: String,
    pool: ConnectionPool,
    counters: Arc<AggregateCounters>,
    controller: PhaseController,
    broadcaster: Arc<dyn Broadcaster>,
    reporter: MetricsReporter<W>,
}

impl<W: Write> Benchmark<W> {
    /// Open every subscription and prepare the HTTP trigger client
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: Config, message: impl Into<String>, out: W, styled: bool) -> Result<Self, BenchError> {
        let broadcaster = Arc::new(HttpBroadcaster::new(&config.target, config.trigger_timeout())?);
        Self::with_broadcaster(config, message, broadcaster, out, styled)
    }

    pub fn with_broadcaster(
        config: Config,
        message: impl Into<String>,
        broadcaster: Arc<dyn Broadcaster>,
        out: W,
        styled: bool,
    ) -> Result<Self, BenchError> {
        let message = message.into();
        debug!(%message, subscribers = config.subscribers, "Benchmark::with_broadcaster: called");

        let pool = ConnectionPool::spawn(&config.target, config.subscribers, &message)?;
        let counters = pool.counters();
        let controller = PhaseController::new(pool.target(), Instant::now());

        Ok(Self {
            config,
            message,
            pool,
            counters,
            controller,
            broadcaster,
            reporter: MetricsReporter::new(out, styled),
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn counters(&self) -> &AggregateCounters {
        &self.counters
    }

    pub fn controller(&self) -> &PhaseController {
        &self.controller
    }

    pub fn reporter(&self) -> &MetricsReporter<W> {
        &self.reporter
    }

    /// Run one tick: advance the controller, fire a trigger if due, report
    pub fn step(&mut self) -> TickOutcome {
        let outcome = self.controller.tick(&self.counters, Instant::now());

        if outcome.trigger {
            self.fire_trigger();
        }

        if let Err(e) = self.reporter.report(outcome.connected, self.controller.run()) {
            debug!(error = %e, "step: status line write failed");
        }

        outcome
    }

    /// Send one broadcast in the background; failures never reach the controller
    fn fire_trigger(&self) {
        let broadcaster = self.broadcaster.clone();
        let channel = self.config.target.channel.clone();
        let message = self.message.clone();
        debug!(%channel, %message, "fire_trigger: called");

        tokio::spawn(async move {
            if let Err(e) = broadcaster.broadcast(&channel, &message).await {
                error!(error = %e, "Broadcast trigger failed");
                eprintln!("problem with request {}", e);
            }
        });
    }

    /// Tick until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(tick_ms = self.config.tick_ms, "Benchmark running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("run_until: shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    self.step();
                }
            }
        }

        if let Err(e) = self.reporter.finish() {
            debug!(error = %e, "run_until: status line finish failed");
        }

        let run = self.controller.run();
        let summary = self.pool.summary();
        info!(
            phase = %run.phase,
            cycles = run.cycles,
            ready = summary.ready,
            pending = summary.pending,
            failed = summary.failed,
            "Benchmark stopped"
        );
    }
}
