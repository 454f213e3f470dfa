//! Subscription pool
//!
//! Opens N long-lived event streams against one channel and folds every
//! inbound line into two shared counters: how many subscriptions are live,
//! and how many live subscriptions have seen the current broadcast.
//!
//! Each subscription lives in an indexed arena slot with an atomic status tag.
//! The counters are atomics so the tick loop can read and reset them from any
//! runtime thread while subscriber tasks keep writing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::error::BenchError;

/// Line the server emits once a subscription has been accepted
pub const READY_MARKER: &str = "data: connected";

/// What a single inbound line means for the subscription that received it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The subscription is live and will receive future broadcasts
    Ready,
    /// The subscription received the current broadcast payload
    Payload,
}

/// Stateless line classifier for one message text
#[derive(Debug, Clone)]
pub struct Classifier {
    payload_marker: String,
}

impl Classifier {
    pub fn new(message: &str) -> Self {
        debug!(%message, "Classifier::new: called");
        Self {
            payload_marker: format!("data: {}", message),
        }
    }

    pub fn payload_marker(&self) -> &str {
        &self.payload_marker
    }

    /// Classify one line received by a subscription
    ///
    /// Payloads only count once the subscription is ready, which also keeps a
    /// message text of "connected" from being mistaken for readiness.
    pub fn classify(&self, line: &str, ready: bool) -> Option<Signal> {
        if ready && line == self.payload_marker {
            return Some(Signal::Payload);
        }
        if line == READY_MARKER {
            return Some(Signal::Ready);
        }
        None
    }
}

/// Counters shared between every subscriber task and the phase controller
#[derive(Debug, Default)]
pub struct AggregateCounters {
    connected: AtomicUsize,
    messages: AtomicUsize,
}

impl AggregateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions observed to have become ready
    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of payload observations in the current cycle
    pub fn messages(&self) -> usize {
        self.messages.load(Ordering::SeqCst)
    }

    pub fn record_ready(&self) {
        self.connected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::SeqCst);
    }

    /// Zero the message counter, returning the count it held
    pub fn reset_messages(&self) -> usize {
        self.messages.swap(0, Ordering::SeqCst)
    }
}

/// Lifecycle tag of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubscriptionStatus {
    Pending = 0,
    Ready = 1,
    Failed = 2,
}

impl From<u8> for SubscriptionStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => SubscriptionStatus::Pending,
            1 => SubscriptionStatus::Ready,
            _ => SubscriptionStatus::Failed,
        }
    }
}

/// Arena entry for one subscription
#[derive(Debug)]
pub struct SubscriptionSlot {
    index: usize,
    status: AtomicU8,
}

impl SubscriptionSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            status: AtomicU8::new(SubscriptionStatus::Pending as u8),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status.load(Ordering::SeqCst).into()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == SubscriptionStatus::Ready
    }

    /// Move from pending to ready; true only for the call that made the move
    pub fn mark_ready(&self) -> bool {
        self.status
            .compare_exchange(
                SubscriptionStatus::Pending as u8,
                SubscriptionStatus::Ready as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Mark the subscription permanently inert
    pub fn mark_failed(&self) {
        self.status.store(SubscriptionStatus::Failed as u8, Ordering::SeqCst);
    }
}

/// Snapshot of subscription statuses across the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
}

/// Reader for one streaming connection
struct StreamSubscriber {
    slot: Arc<SubscriptionSlot>,
    counters: Arc<AggregateCounters>,
    classifier: Arc<Classifier>,
    buffer: Vec<u8>,
}

impl StreamSubscriber {
    fn new(slot: Arc<SubscriptionSlot>, counters: Arc<AggregateCounters>, classifier: Arc<Classifier>) -> Self {
        Self {
            slot,
            counters,
            classifier,
            buffer: Vec::new(),
        }
    }

    /// Open the stream and consume it until it fails or the server closes it
    async fn run(mut self, http: Client, url: String) {
        let index = self.slot.index();
        debug!(index, %url, "StreamSubscriber::run: called");

        let response = match http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(index, error = %e, "run: connect failed");
                self.slot.mark_failed();
                return;
            }
        };

        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            match chunk_result {
                Ok(chunk) => self.feed(&chunk),
                Err(e) => {
                    debug!(index, error = %e, "run: stream error");
                    self.slot.mark_failed();
                    return;
                }
            }
        }

        debug!(index, "run: stream closed by server");
        self.slot.mark_failed();
    }

    /// Buffer a chunk and handle every complete line in it
    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=line_end).collect();

            // Strip the terminator only; message text may end in whitespace
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.handle_line(&String::from_utf8_lossy(&line));
        }
    }

    fn handle_line(&self, line: &str) {
        match self.classifier.classify(line, self.slot.is_ready()) {
            Some(Signal::Ready) => {
                if self.slot.mark_ready() {
                    debug!(index = self.slot.index(), "handle_line: subscription ready");
                    self.counters.record_ready();
                }
            }
            Some(Signal::Payload) => self.counters.record_message(),
            None => {}
        }
    }
}

/// Owner of every subscription and of the shared counters
pub struct ConnectionPool {
    slots: Vec<Arc<SubscriptionSlot>>,
    counters: Arc<AggregateCounters>,
}

impl ConnectionPool {
    /// Open `subscribers` streams against the target channel concurrently
    ///
    /// Must be called from within a tokio runtime. Returns as soon as every
    /// subscription task is spawned; progress is observed through the counters.
    pub fn spawn(target: &TargetConfig, subscribers: usize, message: &str) -> Result<Self, BenchError> {
        debug!(subscribers, channel = %target.channel, "ConnectionPool::spawn: called");
        let http = Client::builder().no_proxy().build()?;
        let url = target.events_url();
        let counters = Arc::new(AggregateCounters::new());
        let classifier = Arc::new(Classifier::new(message));

        let slots: Vec<Arc<SubscriptionSlot>> = (0..subscribers).map(|i| Arc::new(SubscriptionSlot::new(i))).collect();

        for slot in &slots {
            let subscriber = StreamSubscriber::new(slot.clone(), counters.clone(), classifier.clone());
            tokio::spawn(subscriber.run(http.clone(), url.clone()));
        }

        info!(subscribers, %url, "Opened subscriptions");
        Ok(Self { slots, counters })
    }

    /// Handle to the shared counters
    pub fn counters(&self) -> Arc<AggregateCounters> {
        self.counters.clone()
    }

    /// Number of subscriptions the pool was asked to open
    pub fn target(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&SubscriptionSlot> {
        self.slots.get(index).map(|s| s.as_ref())
    }

    pub fn summary(&self) -> StatusSummary {
        self.slots
            .iter()
            .fold(StatusSummary::default(), |mut summary, slot| {
                match slot.status() {
                    SubscriptionStatus::Pending => summary.pending += 1,
                    SubscriptionStatus::Ready => summary.ready += 1,
                    SubscriptionStatus::Failed => summary.failed += 1,
                }
                summary
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn subscriber(message: &str) -> (StreamSubscriber, Arc<AggregateCounters>) {
        let counters = Arc::new(AggregateCounters::new());
        let sub = StreamSubscriber::new(
            Arc::new(SubscriptionSlot::new(0)),
            counters.clone(),
            Arc::new(Classifier::new(message)),
        );
        (sub, counters)
    }

    #[test]
    fn test_classify_ready_and_payload() {
        let classifier = Classifier::new("ping");

        assert_eq!(classifier.payload_marker(), "data: ping");
        assert_eq!(classifier.classify("data: connected", false), Some(Signal::Ready));
        assert_eq!(classifier.classify("data: connected", true), Some(Signal::Ready));
        assert_eq!(classifier.classify("data: ping", true), Some(Signal::Payload));
        assert_eq!(classifier.classify("data: ping", false), None);
        assert_eq!(classifier.classify("data: pingpong", true), None);
        assert_eq!(classifier.classify("", true), None);
    }

    #[test]
    fn test_classify_message_named_connected() {
        let classifier = Classifier::new("connected");

        assert_eq!(classifier.classify("data: connected", false), Some(Signal::Ready));
        assert_eq!(classifier.classify("data: connected", true), Some(Signal::Payload));
    }

    #[test]
    fn test_counters_reset_messages() {
        let counters = AggregateCounters::new();
        counters.record_ready();
        counters.record_message();
        counters.record_message();

        assert_eq!(counters.connected(), 1);
        assert_eq!(counters.reset_messages(), 2);
        assert_eq!(counters.messages(), 0);
        assert_eq!(counters.connected(), 1);
    }

    #[test]
    fn test_slot_ready_is_idempotent() {
        let slot = SubscriptionSlot::new(7);
        assert_eq!(slot.index(), 7);
        assert_eq!(slot.status(), SubscriptionStatus::Pending);

        assert!(slot.mark_ready());
        assert!(!slot.mark_ready());
        assert!(slot.is_ready());

        slot.mark_failed();
        assert_eq!(slot.status(), SubscriptionStatus::Failed);
        assert!(!slot.mark_ready());
    }

    #[test]
    fn test_feed_counts_ready_once() {
        let (mut sub, counters) = subscriber("msg");

        sub.feed(b"data: connected\n\n");
        sub.feed(b"data: connected\n\n");

        assert_eq!(counters.connected(), 1);
        assert!(sub.slot.is_ready());
    }

    #[test]
    fn test_feed_counts_payload_per_line() {
        let (mut sub, counters) = subscriber("msg");

        sub.feed(b"data: connected\n\ndata: msg\n\ndata: other\n\ndata: msg\n\n");

        assert_eq!(counters.connected(), 1);
        assert_eq!(counters.messages(), 2);
    }

    #[test]
    fn test_feed_ignores_payload_before_ready() {
        let (mut sub, counters) = subscriber("msg");

        sub.feed(b"data: msg\n\n");

        assert_eq!(counters.connected(), 0);
        assert_eq!(counters.messages(), 0);
    }

    #[test]
    fn test_feed_joins_split_lines() {
        let (mut sub, counters) = subscriber("hello");

        sub.feed(b"data: conn");
        assert_eq!(counters.connected(), 0);
        sub.feed(b"ected\r\n\r\ndata: hel");
        assert_eq!(counters.connected(), 1);
        sub.feed(b"lo\n");
        assert_eq!(counters.messages(), 1);
    }

    #[test]
    fn test_feed_keeps_trailing_whitespace_in_message() {
        let (mut sub, counters) = subscriber("msg ");

        sub.feed(b"data: connected\n\ndata: msg \n\ndata: msg\n\n");

        assert_eq!(counters.connected(), 1);
        assert_eq!(counters.messages(), 1);
    }

    #[test]
    fn test_feed_matches_empty_message() {
        let (mut sub, counters) = subscriber("");

        sub.feed(b"data: connected\r\n\r\ndata: \r\n\r\n");

        assert_eq!(counters.connected(), 1);
        assert_eq!(counters.messages(), 1);
    }

    #[test]
    fn test_summary_counts_statuses() {
        let pool = ConnectionPool {
            slots: (0..4).map(|i| Arc::new(SubscriptionSlot::new(i))).collect(),
            counters: Arc::new(AggregateCounters::new()),
        };
        pool.slots[0].mark_ready();
        pool.slots[1].mark_ready();
        pool.slots[2].mark_failed();

        assert_eq!(pool.target(), 4);
        assert_eq!(
            pool.summary(),
            StatusSummary {
                pending: 1,
                ready: 2,
                failed: 1
            }
        );
        assert_eq!(pool.slot(2).map(|s| s.status()), Some(SubscriptionStatus::Failed));
        assert!(pool.slot(4).is_none());
    }

    #[tokio::test]
    async fn test_refused_connections_never_count() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = TargetConfig {
            host: "127.0.0.1".to_string(),
            port,
            channel: "channel1".to_string(),
        };
        let pool = ConnectionPool::spawn(&target, 3, "msg").unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let summary = pool.summary();
                if summary.failed == 3 {
                    return summary;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriptions should fail");

        assert_eq!(summary.ready, 0);
        assert_eq!(pool.counters().connected(), 0);
    }
}
