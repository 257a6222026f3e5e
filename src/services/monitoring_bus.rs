//! Monitoring Bus (C12, `spec.md` §4.12). In-process multi-producer,
//! multi-consumer broadcast of structured events. Grounded on the
//! teacher's `services/event_bus.rs` broadcast-channel shape, but closed
//! to the five event kinds this system actually needs — the teacher's
//! sprawling swarm/goal/convergence payload enum has no counterpart here.
//!
//! Slow subscribers are dropped, never blocking a producer: `tokio::sync`'s
//! broadcast channel overwrites the oldest buffered message once a
//! subscriber falls `capacity` messages behind, and that subscriber's next
//! `recv()` returns `RecvError::Lagged` instead of stalling the bus.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::domain::models::{AgentState, IssueRef, PipelinePhase, RateLimitEvent};

#[derive(Debug, Clone)]
pub enum MonitoringEvent {
    AgentUpdate {
        timestamp: DateTime<Utc>,
        agent_id: String,
        state: AgentState,
    },
    PipelineTransition {
        timestamp: DateTime<Utc>,
        issue_ref: IssueRef,
        from: PipelinePhase,
        to: PipelinePhase,
    },
    LogEntry {
        timestamp: DateTime<Utc>,
        level: String,
        message: String,
    },
    RateLimitEvent {
        timestamp: DateTime<Utc>,
        event: RateLimitEvent,
    },
    HealthTick {
        timestamp: DateTime<Utc>,
        component: String,
        healthy: bool,
    },
}

pub struct MonitoringBus {
    sender: broadcast::Sender<MonitoringEvent>,
}

const DEFAULT_QUEUE_DEPTH: usize = 1000;

impl MonitoringBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitoringEvent> {
        self.sender.subscribe()
    }

    /// Producers never block and never observe an error when there are no
    /// subscribers — publishing with zero listeners is a normal state.
    pub fn publish(&self, event: MonitoringEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MonitoringBus {
    fn default() -> Self {
        Self::new()
    }
}
