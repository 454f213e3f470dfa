//! Broadcast trigger
//!
//! One request-response exchange per call against the trigger endpoint. The
//! caller decides what to do with a failure; nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::TargetConfig;
use crate::error::BenchError;

/// Content type header sent with the trigger request (the body itself is JSON)
pub const TRIGGER_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fans a message out to every subscriber of a channel
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, channel: &str, message: &str) -> Result<(), BenchError>;
}

/// Build the trigger request body
pub fn trigger_body(channel: &str, message: &str) -> Result<String, BenchError> {
    let body = serde_json::json!({
        "channel": channel,
        "message": message,
    });
    Ok(serde_json::to_string(&body)?)
}

/// Broadcaster that POSTs to the server's trigger endpoint
pub struct HttpBroadcaster {
    url: String,
    http: Client,
    timeout: Option<Duration>,
}

impl HttpBroadcaster {
    pub fn new(target: &TargetConfig, timeout: Option<Duration>) -> Result<Self, BenchError> {
        debug!(?timeout, "HttpBroadcaster::new: called");
        let http = Client::builder().no_proxy().build()?;
        Ok(Self {
            url: target.broadcast_url(),
            http,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn broadcast(&self, channel: &str, message: &str) -> Result<(), BenchError> {
        debug!(%channel, %message, "HttpBroadcaster::broadcast: called");
        let body = trigger_body(channel, message)?;

        let mut request = self.http.post(&self.url).header(CONTENT_TYPE, TRIGGER_CONTENT_TYPE).body(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        // Drain the body so the connection goes back to the pool
        let drained = response.bytes().await?;
        debug!(%status, bytes = drained.len(), "broadcast: response drained");
        Ok(())
    }
}
