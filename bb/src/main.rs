//! BroadcastBench - fan-out latency benchmark
//!
//! CLI entry point: opens the subscriptions and ticks until Ctrl+C.

use std::io::IsTerminal;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use broadcastbench::Benchmark;
use broadcastbench::cli::Cli;
use broadcastbench::config::Config;
use broadcastbench::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = logging::resolve_level(cli.log_level.as_deref(), config.log_level.as_deref());
    if let Err(e) = logging::init(level, &logging::default_log_dir()) {
        eprintln!("Warning: file logging disabled: {:#}", e);
    }

    config.validate().context("Invalid configuration")?;

    let message = cli.message().to_string();
    info!(
        "BroadcastBench: target={} subscribers={} message={:?}",
        config.target.events_url(),
        config.subscribers,
        message
    );

    let stdout = std::io::stdout();
    let styled = stdout.is_terminal();
    let mut bench = Benchmark::start(config, message, stdout, styled).context("Failed to start benchmark")?;

    bench
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                debug!(error = %e, "main: ctrl_c listener failed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let run = bench.controller().run();
    let summary = bench.pool().summary();
    println!(
        "{} Stopped while {} after {} broadcast cycles (ready: {}, pending: {}, failed: {})",
        "✓".green(),
        run.phase.to_string().as_str().cyan(),
        run.cycles,
        summary.ready,
        summary.pending,
        summary.failed
    );

    Ok(())
}
