//! Per-backend circuit breaker.
//!
//! Closed passes calls through and counts failures; at the threshold the
//! circuit opens and rejects without I/O until the recovery deadline, then
//! admits exactly one trial (HalfOpen). Trial success closes the circuit and
//! resets the count; trial failure re-opens it with a fresh deadline.
//! Callers arriving while a trial is outstanding are rejected as if the
//! circuit were still open.

use chrono::Utc;
use gimbal_core::{BackendKind, CircuitSnapshot, CircuitState, Timestamp};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; call normally.
    Allow,
    /// Circuit was open and the recovery deadline has passed; this caller
    /// holds the single trial slot and MUST report success or failure.
    Trial,
    /// Rejected without a network attempt.
    Rejected {
        /// When the next trial will be admitted.
        retry_at: Timestamp,
    },
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Timestamp>,
    /// Monotonic deadline used for admission decisions.
    retry_deadline: Option<Instant>,
    /// Wall-clock mirror of the deadline, for snapshots and errors.
    retry_display: Option<Timestamp>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn fresh() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            retry_deadline: None,
            retry_display: None,
            trial_in_flight: false,
        }
    }

    fn open(&mut self, recovery_timeout: Duration) {
        self.state = CircuitState::Open;
        self.retry_deadline = Some(Instant::now() + recovery_timeout);
        self.retry_display = Utc::now()
            .checked_add_signed(
                chrono::Duration::from_std(recovery_timeout).unwrap_or(chrono::Duration::zero()),
            )
            .or(Some(Utc::now()));
        self.trial_in_flight = false;
    }
}

/// Circuit breaker for one backend.
///
/// All state lives behind a single mutex and is replaced wholesale on
/// transition; `snapshot()` never observes a half-applied change. The mutex
/// also carries the single-trial slot for HalfOpen.
pub struct CircuitBreaker {
    backend: BackendKind,
    threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    ///
    /// `threshold` is the consecutive-failure count that opens the circuit;
    /// `recovery_timeout` is how long Open rejects before admitting a trial.
    /// Both come pre-validated from `GimbalConfig`.
    pub fn new(backend: BackendKind, threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            backend,
            threshold,
            recovery_timeout,
            inner: Mutex::new(BreakerInner::fresh()),
        }
    }

    /// The backend this breaker guards.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    // The guarded struct is always left consistent before unlocking, so a
    // poisoned mutex still holds a usable state.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed right now.
    ///
    /// Returns [`Admission::Trial`] for at most one caller per recovery
    /// window; that caller must follow up with [`record_success`] or
    /// [`record_failure`].
    ///
    /// [`record_success`]: Self::record_success
    /// [`record_failure`]: Self::record_failure
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Admission::Allow,
            CircuitState::Open => {
                let deadline_passed = inner
                    .retry_deadline
                    .map(|deadline| Instant::now() >= deadline)
                    .unwrap_or(true);
                if deadline_passed && !inner.trial_in_flight {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(backend = %self.backend, "circuit half-open, admitting trial call");
                    Admission::Trial
                } else {
                    Admission::Rejected {
                        retry_at: inner.retry_display.unwrap_or_else(Utc::now),
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission::Rejected {
                        retry_at: inner.retry_display.unwrap_or_else(Utc::now),
                    }
                } else {
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            }
        }
    }

    /// Record a successful call against this backend.
    ///
    /// Closes the circuit (and resets the failure count) when a trial was
    /// outstanding; a success on a Closed circuit changes nothing, since the
    /// count only resets on a transition into Closed.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            tracing::info!(backend = %self.backend, "trial succeeded, circuit closed");
            *inner = BreakerInner::fresh();
        }
    }

    /// Record a failed call (or probe, or timeout) against this backend.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Utc::now());
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.threshold {
                    inner.open(self.recovery_timeout);
                    tracing::warn!(
                        backend = %self.backend,
                        failures = inner.failure_count,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.open(self.recovery_timeout);
                tracing::warn!(backend = %self.backend, "trial failed, circuit re-opened");
            }
            // Already open: count the signal (probes keep reporting) but do
            // not push the recovery deadline out, or a probing monitor would
            // keep the circuit open forever.
            CircuitState::Open => {}
        }
    }

    /// Force the circuit back to Closed. Idempotent; for operational use.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed || inner.failure_count > 0 {
            tracing::info!(backend = %self.backend, "circuit manually reset to closed");
        }
        *inner = BreakerInner::fresh();
    }

    /// Point-in-time view of the breaker.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
            next_retry_at: inner.retry_display,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("backend", &self.backend)
            .field("threshold", &self.threshold)
            .field("state", &snapshot.state)
            .field("failure_count", &snapshot.failure_count)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// N consecutive failures with N >= threshold always yields Open.
        #[test]
        fn prop_breaker_monotonicity(
            threshold in 1u32..32,
            extra in 0u32..32,
        ) {
            let b = CircuitBreaker::new(
                BackendKind::Store,
                threshold,
                Duration::from_secs(60),
            );
            for _ in 0..(threshold + extra) {
                b.record_failure();
            }
            prop_assert_eq!(b.snapshot().state, CircuitState::Open);
            prop_assert!(b.snapshot().failure_count >= threshold);
        }

        /// Fewer than threshold failures never opens the circuit.
        #[test]
        fn prop_below_threshold_stays_closed(threshold in 2u32..32) {
            let b = CircuitBreaker::new(
                BackendKind::Store,
                threshold,
                Duration::from_secs(60),
            );
            for _ in 0..(threshold - 1) {
                b.record_failure();
            }
            prop_assert_eq!(b.snapshot().state, CircuitState::Closed);
        }

        /// A trial success always yields Closed with the count reset to 0,
        /// regardless of how many failures preceded it.
        #[test]
        fn prop_trial_success_closes_with_zero_count(
            threshold in 1u32..16,
            extra in 0u32..16,
        ) {
            let b = CircuitBreaker::new(BackendKind::Cache, threshold, Duration::ZERO);
            for _ in 0..(threshold + extra) {
                b.record_failure();
            }
            prop_assert_eq!(b.admit(), Admission::Trial);
            b.record_success();
            let snapshot = b.snapshot();
            prop_assert_eq!(snapshot.state, CircuitState::Closed);
            prop_assert_eq!(snapshot.failure_count, 0);
        }
    }
}
