//! Circuit breaker state types.
//!
//! The state machine itself lives in the engine crate; these are the shared
//! data shapes readers observe.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without a network attempt.
    Open,
    /// One trial call is in flight; everyone else is rejected.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// A point-in-time view of one backend's breaker.
///
/// Produced by atomic replacement on every transition; readers never observe
/// a partially-updated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures counted since the last transition into Closed.
    pub failure_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure_at: Option<Timestamp>,
    /// When an Open circuit will next admit a trial call.
    pub next_retry_at: Option<Timestamp>,
}

impl CircuitSnapshot {
    /// A fresh breaker: Closed with no recorded failures.
    pub fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            next_retry_at: None,
        }
    }

    /// Whether calls would currently be rejected without an attempt.
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    /// Whether an Open circuit's recovery deadline has passed, making a
    /// trial call due. Always true for a circuit with no recorded deadline.
    pub fn retry_due(&self, now: crate::Timestamp) -> bool {
        match self.next_retry_at {
            Some(at) => now >= at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
    }

    #[test]
    fn test_closed_snapshot() {
        let snapshot = CircuitSnapshot::closed();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.last_failure_at.is_none());
        assert!(snapshot.next_retry_at.is_none());
        assert!(!snapshot.is_open());
    }

    #[test]
    fn test_retry_due() {
        let now = chrono::Utc::now();
        let mut snapshot = CircuitSnapshot::closed();
        assert!(snapshot.retry_due(now), "no deadline means due");

        snapshot.state = CircuitState::Open;
        snapshot.next_retry_at = Some(now + chrono::Duration::seconds(30));
        assert!(!snapshot.retry_due(now));

        snapshot.next_retry_at = Some(now - chrono::Duration::seconds(1));
        assert!(snapshot.retry_due(now));
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let snapshot = CircuitSnapshot {
            state: CircuitState::HalfOpen,
            failure_count: 5,
            last_failure_at: Some(chrono::Utc::now()),
            next_retry_at: Some(chrono::Utc::now()),
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        assert!(json.contains("half_open"));
        let back: CircuitSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snapshot);
    }
}
