//! CLI argument parsing for broadcastbench

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bb")]
#[command(author, version, about = "Fan-out latency benchmark for streaming pub/sub servers", long_about = None)]
pub struct Cli {
    /// Message text to broadcast on every cycle
    #[arg(default_value = crate::DEFAULT_MESSAGE)]
    pub message: String,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Message to broadcast; an empty argument means the default
    pub fn message(&self) -> &str {
        if self.message.is_empty() {
            crate::DEFAULT_MESSAGE
        } else {
            &self.message
        }
    }
}
