//! BroadcastBench - fan-out latency benchmark for streaming pub/sub servers
//!
//! Opens a large number of concurrent event-stream subscriptions against one
//! channel, waits until every one of them is live, then repeatedly triggers a
//! broadcast and measures how long it takes to reach every subscriber.
//!
//! # Measurements
//!
//! - **Connection time**: from startup until all subscriptions reported ready
//! - **Broadcast time**: from issuing a trigger until every subscriber saw it
//!
//! # Modules
//!
//! - [`pool`] - Subscription arena, stream readers and shared counters
//! - [`trigger`] - Broadcast trigger client
//! - [`controller`] - Tick-driven phase state machine
//! - [`reporter`] - In-place status line
//! - [`bench`] - Tick loop wiring the pieces together
//! - [`config`] - Configuration types and loading
//! - [`logging`] - File logging setup
//! - [`cli`] - Command-line interface

pub mod bench;
pub mod cli;
pub mod config;
pub mod controller;
mod error;
pub mod logging;
pub mod pool;
pub mod reporter;
pub mod trigger;

pub use bench::Benchmark;
pub use config::{Config, TargetConfig};
pub use controller::{BenchmarkRun, Phase, PhaseController, TickOutcome};
pub use error::BenchError;
pub use pool::{AggregateCounters, Classifier, ConnectionPool, Signal, StatusSummary, SubscriptionStatus};
pub use reporter::MetricsReporter;
pub use trigger::{Broadcaster, HttpBroadcaster};

/// Default number of concurrent subscriptions
pub const DEFAULT_SUBSCRIBERS: usize = 1000;

/// Default broadcast server host
pub const DEFAULT_HOST: &str = "localhost";

/// Default broadcast server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default channel every subscription joins
pub const DEFAULT_CHANNEL: &str = "channel1";

/// Default message text when none is given on the command line
pub const DEFAULT_MESSAGE: &str = "msg";

/// Default phase evaluation period (20ms)
pub const DEFAULT_TICK_MS: u64 = 20;
