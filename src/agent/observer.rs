//! Budget event observers.
//!
//! Every approve/deny decision produces exactly one [`BudgetEvent`]. Observers
//! see the event after the decision is final and cannot change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One budget decision, as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEvent {
    agent: String,
    epsilon: f64,
    total: f64,
    approved: bool,
    timestamp: DateTime<Utc>,
}

impl BudgetEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(agent: impl Into<String>, epsilon: f64, total: f64, approved: bool) -> Self {
        Self {
            agent: agent.into(),
            epsilon,
            total,
            approved,
            timestamp: Utc::now(),
        }
    }

    /// Label of the agent that made the decision.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Requested epsilon.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Cumulative epsilon after the decision (unchanged on denial).
    #[must_use]
    pub const fn total(&self) -> f64 {
        self.total
    }

    /// Whether the charge was admitted.
    #[must_use]
    pub const fn approved(&self) -> bool {
        self.approved
    }

    /// Wall-clock time of the decision.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Listener for budget decisions.
///
/// Called after the agent has released its lock. A panicking observer is
/// contained and does not affect the decision.
pub trait BudgetObserver: Send + Sync {
    /// Receive one decision.
    fn on_decision(&self, event: &BudgetEvent);
}

/// Emits each decision as a single structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BudgetObserver for TracingObserver {
    fn on_decision(&self, event: &BudgetEvent) {
        if event.approved {
            tracing::info!(
                agent = %event.agent,
                epsilon = event.epsilon,
                total = event.total,
                "privacy change"
            );
        } else {
            tracing::warn!(
                agent = %event.agent,
                epsilon = event.epsilon,
                total = event.total,
                "privacy charge denied"
            );
        }
    }
}

/// In-memory record of every decision, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BudgetEvent>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<BudgetEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl BudgetObserver for EventLog {
    fn on_decision(&self, event: &BudgetEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = BudgetEvent::new("census.csv", 0.5, 1.5, true);

        assert_eq!(event.agent(), "census.csv");
        assert!((event.epsilon() - 0.5).abs() < f64::EPSILON);
        assert!((event.total() - 1.5).abs() < f64::EPSILON);
        assert!(event.approved());
        assert!(event.timestamp() <= Utc::now());
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = BudgetEvent::new("a", 0.1, 0.1, false);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"agent\":\"a\""));
        assert!(json.contains("\"approved\":false"));

        let back: BudgetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::new();
        assert!(log.is_empty());

        log.on_decision(&BudgetEvent::new("a", 0.1, 0.1, true));
        log.on_decision(&BudgetEvent::new("a", 0.2, 0.1, false));

        let events = log.events();
        assert_eq!(log.len(), 2);
        assert!(events[0].approved());
        assert!(!events[1].approved());

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_tracing_observer_does_not_panic_without_subscriber() {
        TracingObserver.on_decision(&BudgetEvent::new("a", 1.0, 1.0, true));
        TracingObserver.on_decision(&BudgetEvent::new("a", 1.0, 1.0, false));
    }
}
