//! File logging setup
//!
//! Traces go to a file so the status line on stdout stays intact. When the
//! log file cannot be opened the benchmark runs without file logging.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::info;

pub const LOG_FILE_NAME: &str = "broadcastbench.log";

/// Parse a log level name, `None` when the name is unknown
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    match name.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

/// Resolve the effective level. Priority: CLI --log-level > config file > INFO
pub fn resolve_level(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> tracing::Level {
    match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    }
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("broadcastbench")
        .join("logs")
}

/// Create `dir` if needed and truncate the log file inside it
pub fn open_log_file(dir: &Path) -> Result<File> {
    fs::create_dir_all(dir).context("Failed to create log directory")?;
    File::create(dir.join(LOG_FILE_NAME)).context("Failed to create log file")
}

/// Install the global subscriber writing to `dir`
pub fn init(level: tracing::Level, dir: &Path) -> Result<()> {
    let log_file = open_log_file(dir)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}
