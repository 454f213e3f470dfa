//! BroadcastBench configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broadcast server endpoint
    pub target: TargetConfig,

    /// Number of concurrent subscriptions to open
    pub subscribers: usize,

    /// Phase evaluation period in milliseconds
    #[serde(rename = "tick-ms")]
    pub tick_ms: u64,

    /// Timeout for a single trigger request (none when unset)
    #[serde(rename = "trigger-timeout-ms")]
    pub trigger_timeout_ms: Option<u64>,

    /// Log level used when none is given on the command line
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            subscribers: crate::DEFAULT_SUBSCRIBERS,
            tick_ms: crate::DEFAULT_TICK_MS,
            trigger_timeout_ms: None,
            log_level: None,
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.subscribers == 0 {
            return Err(eyre::eyre!("subscribers must be at least 1"));
        }
        if self.tick_ms == 0 {
            return Err(eyre::eyre!("tick-ms must be at least 1"));
        }
        Ok(())
    }

    /// Load `config_path` if given, else the first usable default location, else defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path).context(format!("Failed to load config from {}", path.display())),
            None => Ok(Self::load_first(&Self::default_paths())),
        }
    }

    /// Project-local `.broadcastbench.yml`, then the user config directory
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".broadcastbench.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("broadcastbench").join("broadcastbench.yml"));
        }
        paths
    }

    // Runs before the log file is set up, so skipped files are reported on stderr
    fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => eprintln!("Warning: skipping config {}: {:#}", path.display(), e),
            }
        }
        Self::default()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn trigger_timeout(&self) -> Option<Duration> {
        self.trigger_timeout_ms.map(Duration::from_millis)
    }
}

/// Broadcast server endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,

    /// Channel every subscription joins and every broadcast targets
    pub channel: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            channel: crate::DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl TargetConfig {
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Streaming subscription endpoint for the configured channel
    pub fn events_url(&self) -> String {
        format!("{}/events/{}", self.base_url(), self.channel)
    }

    /// Broadcast trigger endpoint
    pub fn broadcast_url(&self) -> String {
        format!("{}/broadcast/", self.base_url())
    }
}
