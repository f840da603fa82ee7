//! Strategy selection: which backend(s) to try, in what order, and whether
//! write-through applies.
//!
//! `select` is a pure function over the caller's preference and the current
//! health/circuit readings; it performs no I/O and never suspends. Every
//! decision names the rule that fired so degraded routing stays observable.

use gimbal_core::{
    BackendKind, CircuitSnapshot, CircuitState, ComplexityPolicy, ConfigError, HealthVerdict,
    RouteReason, SearchQuery, SearchStrategy,
};
use regex::Regex;

/// The ordered execution plan for one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    /// The strategy that governed the decision (after applying the default).
    pub strategy: SearchStrategy,
    /// Backend tried first.
    pub primary: BackendKind,
    /// Backend tried when the primary misses or fails.
    pub fallback: Option<BackendKind>,
    /// Whether a store-served result should be written through to the cache.
    pub write_through: bool,
    /// The rule that fired.
    pub reason: RouteReason,
}

impl SearchPlan {
    fn store_only(strategy: SearchStrategy, write_through: bool, reason: RouteReason) -> Self {
        Self {
            strategy,
            primary: BackendKind::Store,
            fallback: None,
            write_through,
            reason,
        }
    }

    fn cache_first(strategy: SearchStrategy, reason: RouteReason) -> Self {
        Self {
            strategy,
            primary: BackendKind::Cache,
            fallback: Some(BackendKind::Store),
            write_through: true,
            reason,
        }
    }
}

/// Compiled form of the hybrid complexity policy.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    max_simple_length: usize,
    operators: Regex,
}

impl QueryClassifier {
    /// Compile a policy. The pattern was already checked by
    /// `GimbalConfig::validate`, but compilation failures still surface as
    /// configuration errors rather than panics.
    pub fn from_policy(policy: &ComplexityPolicy) -> Result<Self, ConfigError> {
        let operators =
            Regex::new(&policy.operator_pattern).map_err(|e| ConfigError::InvalidValue {
                field: "complexity.operator_pattern".to_string(),
                value: policy.operator_pattern.clone(),
                reason: format!("pattern does not compile: {}", e),
            })?;
        Ok(Self {
            max_simple_length: policy.max_simple_length,
            operators,
        })
    }

    /// Whether a query is complex: over the length threshold, or carrying
    /// structured operators.
    pub fn is_complex(&self, text: &str) -> bool {
        text.chars().count() > self.max_simple_length || self.operators.is_match(text)
    }
}

/// Decide the plan for one query.
///
/// Rules are evaluated in order; the first that applies wins:
/// 1. explicit database-only;
/// 2. cache circuit open;
/// 3. cache-first with a healthy cache;
/// 4. hybrid classification;
/// 5. store fallback with best-effort write-through.
pub fn select(
    query: &SearchQuery,
    default_strategy: SearchStrategy,
    cache_verdict: HealthVerdict,
    cache_circuit: &CircuitSnapshot,
    classifier: &QueryClassifier,
) -> SearchPlan {
    let strategy = query.requested_strategy().unwrap_or(default_strategy);

    // Rule 1: an explicit database-only request bypasses the cache entirely,
    // reads and writes both.
    if strategy == SearchStrategy::DatabaseOnly {
        return SearchPlan::store_only(strategy, false, RouteReason::ExplicitDatabaseOnly);
    }

    // Rule 2: an open cache circuit means no cache I/O on the hot path, not
    // even repair writes. Once the recovery deadline has passed the rule no
    // longer applies: routing must reach the cache again so the breaker can
    // admit its single trial call (everyone the trial beats is rejected at
    // admission and falls through to the store anyway).
    if cache_circuit.state == CircuitState::Open && !cache_circuit.retry_due(chrono::Utc::now()) {
        return SearchPlan::store_only(strategy, false, RouteReason::CacheCircuitOpen);
    }

    match strategy {
        // Rule 3.
        SearchStrategy::CacheFirst if cache_verdict == HealthVerdict::Healthy => {
            SearchPlan::cache_first(strategy, RouteReason::CacheHealthy)
        }
        // Rule 4: complex queries go straight to the store; simple ones are
        // routed like rule 3 when the cache is usable.
        SearchStrategy::Hybrid => {
            if classifier.is_complex(&query.text) {
                SearchPlan::store_only(strategy, false, RouteReason::ComplexQuery)
            } else if cache_verdict == HealthVerdict::Healthy {
                SearchPlan::cache_first(strategy, RouteReason::SimpleQuery)
            } else {
                SearchPlan::store_only(strategy, true, RouteReason::CacheDegraded)
            }
        }
        // Rule 5: cache unhealthy or unknown; serve from the store and
        // attempt to repopulate the cache best-effort.
        _ => SearchPlan::store_only(strategy, true, RouteReason::CacheDegraded),
    }
}

// =============================================================================
// TESTS
// =============================================================================
