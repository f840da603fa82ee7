//! Health status types shared by the monitor, the selector, and stats.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one health probe against a backend.
///
/// Replaced wholesale on every probe; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the probe reached the backend at all.
    pub connected: bool,
    /// Whether the backend reported itself able to serve searches.
    pub search_capable: bool,
    /// Wall-clock duration of the probe call.
    pub latency: Duration,
    /// Errors observed during the probe, if any.
    pub errors: Vec<String>,
    /// When the probe completed.
    pub checked_at: Timestamp,
}

impl HealthStatus {
    /// A successful probe result, stamped now.
    pub fn healthy(latency: Duration) -> Self {
        Self {
            connected: true,
            search_capable: true,
            latency,
            errors: Vec::new(),
            checked_at: chrono::Utc::now(),
        }
    }

    /// A failed probe result, stamped now.
    pub fn unhealthy(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            connected: false,
            search_capable: false,
            latency,
            errors: vec![error.into()],
            checked_at: chrono::Utc::now(),
        }
    }

    /// Append one more observed error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Connected and able to serve searches.
    pub fn is_healthy(&self) -> bool {
        self.connected && self.search_capable
    }

    /// How long ago this status was captured.
    pub fn age(&self) -> Duration {
        chrono::Utc::now()
            .signed_duration_since(self.checked_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether this status is older than the given TTL.
    ///
    /// A stale status must be treated as unknown, never as healthy.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Collapse this status plus its age into a routing verdict.
    pub fn verdict(&self, ttl: Duration) -> HealthVerdict {
        if self.is_stale(ttl) {
            HealthVerdict::Unknown
        } else if self.is_healthy() {
            HealthVerdict::Healthy
        } else {
            HealthVerdict::Degraded
        }
    }
}

/// Three-valued health reading used by the strategy selector.
///
/// `Unknown` covers both "never probed" and "status older than its TTL".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    /// Fresh status, connected and search-capable.
    Healthy,
    /// Fresh status, but the backend is impaired.
    Degraded,
    /// No status, or the status has outlived its TTL.
    Unknown,
}

impl HealthVerdict {
    /// Derive a verdict from an optional cached status.
    pub fn from_cached(status: Option<&HealthStatus>, ttl: Duration) -> Self {
        match status {
            Some(status) => status.verdict(ttl),
            None => Self::Unknown,
        }
    }
}

impl std::fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_constructor() {
        let status = HealthStatus::healthy(Duration::from_millis(4));
        assert!(status.is_healthy());
        assert!(status.errors.is_empty());
        assert_eq!(status.latency, Duration::from_millis(4));
    }

    #[test]
    fn test_unhealthy_constructor() {
        let status = HealthStatus::unhealthy(Duration::from_millis(30), "connection refused");
        assert!(!status.is_healthy());
        assert!(!status.connected);
        assert_eq!(status.errors, vec!["connection refused".to_string()]);
    }

    #[test]
    fn test_with_error_appends() {
        let status = HealthStatus::unhealthy(Duration::ZERO, "first").with_error("second");
        assert_eq!(status.errors.len(), 2);
    }

    #[test]
    fn test_fresh_status_is_not_stale() {
        let status = HealthStatus::healthy(Duration::from_millis(1));
        assert!(!status.is_stale(Duration::from_secs(30)));
        assert_eq!(status.verdict(Duration::from_secs(30)), HealthVerdict::Healthy);
    }

    #[test]
    fn test_old_status_is_unknown_not_healthy() {
        let mut status = HealthStatus::healthy(Duration::from_millis(1));
        status.checked_at = chrono::Utc::now() - chrono::Duration::seconds(120);
        assert!(status.is_stale(Duration::from_secs(30)));
        assert_eq!(status.verdict(Duration::from_secs(30)), HealthVerdict::Unknown);
    }

    #[test]
    fn test_fresh_but_failed_status_is_degraded() {
        let status = HealthStatus::unhealthy(Duration::from_millis(1), "down");
        assert_eq!(status.verdict(Duration::from_secs(30)), HealthVerdict::Degraded);
    }

    #[test]
    fn test_verdict_from_missing_status() {
        assert_eq!(
            HealthVerdict::from_cached(None, Duration::from_secs(30)),
            HealthVerdict::Unknown
        );
    }
}
