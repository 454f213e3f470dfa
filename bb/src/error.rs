//! Benchmark error types

use thiserror::Error;

/// Errors that can occur while talking to the broadcast server
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Check if the failure happened before any response arrived
    pub fn is_connect(&self) -> bool {
        match self {
            BenchError::Network(e) => e.is_connect(),
            BenchError::Json(_) => false,
            BenchError::Io(_) => false,
        }
    }
}
