//! Phase controller
//!
//! A tick-driven state machine over the pool's counters:
//!
//! ```text
//! connecting --(all connected)--> messaging --(trigger)--> waiting
//!                                     ^                       |
//!                                     +---(all received)------+
//! ```
//!
//! `tick` is a pure transition function apart from resetting the message
//! counter; the caller performs the trigger when the outcome asks for it.
//! Transitions are evaluated in order within one tick, so the tick that sees
//! every subscription connected also issues the first broadcast.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::pool::AggregateCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for every subscription to report ready
    Connecting,
    /// A broadcast is due on this tick
    Messaging,
    /// Waiting for every subscriber to receive the broadcast
    Waiting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::Messaging => "messaging",
            Phase::Waiting => "waiting",
        };
        write!(f, "{}", name)
    }
}

/// State of one benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub phase: Phase,
    /// Time from controller creation until all subscriptions were ready
    pub connection_time: Option<Duration>,
    /// Round trip of the most recently completed broadcast
    pub broadcast_time: Option<Duration>,
    pub cycle_start: Instant,
    /// Completed broadcast cycles
    pub cycles: u64,
}

/// What the caller has to do after a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Connected count observed on this tick
    pub connected: usize,
    /// A broadcast must be triggered now
    pub trigger: bool,
}

pub struct PhaseController {
    target: usize,
    run: BenchmarkRun,
}

impl PhaseController {
    pub fn new(target: usize, now: Instant) -> Self {
        debug!(subscribers = target, "PhaseController::new: called");
        Self {
            target,
            run: BenchmarkRun {
                phase: Phase::Connecting,
                connection_time: None,
                broadcast_time: None,
                cycle_start: now,
                cycles: 0,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.run.phase
    }

    pub fn run(&self) -> &BenchmarkRun {
        &self.run
    }

    fn transition(&mut self, to: Phase) {
        debug!(from = %self.run.phase, %to, "transition: called");
        self.run.phase = to;
    }

    /// Evaluate one tick against the current counters
    pub fn tick(&mut self, counters: &AggregateCounters, now: Instant) -> TickOutcome {
        let connected = counters.connected();
        let mut outcome = TickOutcome {
            connected,
            trigger: false,
        };

        if self.run.phase == Phase::Connecting && connected == self.target {
            let elapsed = now.saturating_duration_since(self.run.cycle_start);
            info!(connection_ms = elapsed.as_millis() as u64, connected, "All subscriptions connected");
            self.run.connection_time = Some(elapsed);
            self.transition(Phase::Messaging);
        }

        if self.run.phase == Phase::Messaging {
            self.run.cycle_start = now;
            self.transition(Phase::Waiting);
            outcome.trigger = true;
        }

        if self.run.phase == Phase::Waiting && counters.messages() >= self.target {
            let elapsed = now.saturating_duration_since(self.run.cycle_start);
            self.run.broadcast_time = Some(elapsed);
            let received = counters.reset_messages();
            self.run.cycles += 1;
            info!(
                broadcast_ms = elapsed.as_millis() as u64,
                received,
                cycle = self.run.cycles,
                "Broadcast reached all subscribers"
            );
            self.transition(Phase::Messaging);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect_all(counters: &AggregateCounters, n: usize) {
        for _ in 0..n {
            counters.record_ready();
        }
    }

    fn deliver(counters: &AggregateCounters, n: usize) {
        for _ in 0..n {
            counters.record_message();
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Connecting.to_string(), "connecting");
        assert_eq!(Phase::Messaging.to_string(), "messaging");
        assert_eq!(Phase::Waiting.to_string(), "waiting");
    }

    #[test]
    fn test_stays_connecting_until_all_ready() {
        let start = Instant::now();
        let counters = AggregateCounters::new();
        let mut controller = PhaseController::new(3, start);

        connect_all(&counters, 2);
        for i in 1..=10 {
            let outcome = controller.tick(&counters, start + Duration::from_millis(20 * i));
            assert!(!outcome.trigger);
            assert_eq!(outcome.connected, 2);
        }

        assert_eq!(controller.phase(), Phase::Connecting);
        assert!(controller.run().connection_time.is_none());
        assert!(controller.run().broadcast_time.is_none());
    }

    #[test]
    fn test_connected_tick_records_time_and_triggers() {
        let start = Instant::now();
        let counters = AggregateCounters::new();
        let mut controller = PhaseController::new(3, start);

        connect_all(&counters, 3);
        let now = start + Duration::from_millis(140);
        let outcome = controller.tick(&counters, now);

        assert!(outcome.trigger);
        assert_eq!(outcome.connected, 3);
        assert_eq!(controller.phase(), Phase::Waiting);
        assert_eq!(controller.run().connection_time, Some(Duration::from_millis(140)));
        assert_eq!(controller.run().cycle_start, now);
    }

    #[test]
    fn test_waits_for_every_subscriber() {
        let start = Instant::now();
        let counters = AggregateCounters::new();
        let mut controller = PhaseController::new(3, start);

        connect_all(&counters, 3);
        controller.tick(&counters, start);

        deliver(&counters, 2);
        let outcome = controller.tick(&counters, start + Duration::from_millis(20));
        assert!(!outcome.trigger);
        assert_eq!(controller.phase(), Phase::Waiting);
        assert_eq!(counters.messages(), 2);
    }

    #[test]
    fn test_full_cycle_sequence() {
        let start = Instant::now();
        let counters = AggregateCounters::new();
        let mut controller = PhaseController::new(3, start);

        connect_all(&counters, 3);
        let sent_at = start + Duration::from_millis(20);
        assert!(controller.tick(&counters, sent_at).trigger);
        assert_eq!(controller.phase(), Phase::Waiting);

        deliver(&counters, 3);
        let outcome = controller.tick(&counters, sent_at + Duration::from_millis(20));
        assert!(!outcome.trigger);
        assert_eq!(controller.phase(), Phase::Messaging);
        assert_eq!(controller.run().broadcast_time, Some(Duration::from_millis(20)));
        assert_eq!(controller.run().cycles, 1);
        assert_eq!(counters.messages(), 0);

        // Next tick starts the next cycle with the same message
        let resent_at = sent_at + Duration::from_millis(40);
        assert!(controller.tick(&counters, resent_at).trigger);
        assert_eq!(controller.phase(), Phase::Waiting);
        assert_eq!(controller.run().cycle_start, resent_at);

        deliver(&counters, 4);
        controller.tick(&counters, resent_at + Duration::from_millis(60));
        assert_eq!(controller.phase(), Phase::Messaging);
        assert_eq!(controller.run().broadcast_time, Some(Duration::from_millis(60)));
        assert_eq!(controller.run().cycles, 2);

        // Connection time is only ever recorded once
        assert_eq!(controller.run().connection_time, Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_never_returns_to_connecting() {
        let start = Instant::now();
        let counters = AggregateCounters::new();
        let mut controller = PhaseController::new(1, start);

        connect_all(&counters, 1);
        for i in 0..20u64 {
            if i % 2 == 1 {
                deliver(&counters, 1);
            }
            controller.tick(&counters, start + Duration::from_millis(20 * i));
            assert_ne!(controller.phase(), Phase::Connecting);
        }
        assert_eq!(controller.run().cycles, 10);
    }
}
