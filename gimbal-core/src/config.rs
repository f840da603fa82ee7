//! Orchestrator configuration.
//!
//! An explicitly constructed, immutable value passed in at construction
//! time. Validation happens once, in `validate()`, and is the only place
//! `ConfigError` can surface; nothing re-validates mid-call.

use crate::error::ConfigError;
use crate::query::SearchStrategy;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex"));

/// Default pattern marking a query as structurally complex: quoted phrases,
/// boolean keywords, grouping, or +/- term prefixes.
pub const DEFAULT_OPERATOR_PATTERN: &str = r#""[^"]+"|\b(?:AND|OR|NOT)\b|[()]|(?:^|\s)[+-]\w"#;

/// Policy for the hybrid strategy's query classification.
///
/// Heuristic by design; both knobs are configuration, not algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityPolicy {
    /// Queries longer than this many characters are complex.
    pub max_simple_length: usize,
    /// Queries matching this pattern are complex regardless of length.
    pub operator_pattern: String,
}

impl Default for ComplexityPolicy {
    fn default() -> Self {
        Self {
            max_simple_length: 120,
            operator_pattern: DEFAULT_OPERATOR_PATTERN.to_string(),
        }
    }
}

/// Table and column mapping the store adapter translates into its native
/// query form. Opaque to the engine beyond validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    /// Table (or collection) searched.
    pub table: String,
    /// Column holding the stable item identifier.
    pub id_column: String,
    /// Columns matched against the query text.
    pub search_columns: Vec<String>,
    /// Columns returned as display fields.
    pub display_columns: Vec<String>,
}

impl TableMapping {
    /// Create a mapping; columns may be extended with the builders below.
    pub fn new(table: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: id_column.into(),
            search_columns: Vec::new(),
            display_columns: Vec::new(),
        }
    }

    /// Add a column matched against query text.
    pub fn with_search_column(mut self, column: impl Into<String>) -> Self {
        self.search_columns.push(column.into());
        self
    }

    /// Add a column returned as a display field.
    pub fn with_display_column(mut self, column: impl Into<String>) -> Self {
        self.display_columns.push(column.into());
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.table.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "mapping.table".to_string(),
            });
        }
        if self.id_column.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "mapping.id_column".to_string(),
            });
        }
        if self.search_columns.is_empty() {
            return Err(ConfigError::InvalidMapping {
                reason: "at least one search column is required".to_string(),
            });
        }
        for column in std::iter::once(&self.table)
            .chain(std::iter::once(&self.id_column))
            .chain(self.search_columns.iter())
            .chain(self.display_columns.iter())
        {
            if !IDENTIFIER.is_match(column) {
                return Err(ConfigError::InvalidMapping {
                    reason: format!("'{}' is not a valid identifier", column),
                });
            }
        }
        Ok(())
    }
}

/// Process-wide configuration. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GimbalConfig {
    /// Consecutive failures before a backend's circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit waits before admitting a trial call.
    pub recovery_timeout: Duration,
    /// How long a cached HealthStatus may be trusted.
    pub health_ttl: Duration,
    /// Deadline for one health probe call.
    pub probe_timeout: Duration,
    /// Deadline for one backend search/cache call.
    pub backend_timeout: Duration,
    /// Expiry applied to write-through cache entries.
    pub cache_ttl: Duration,
    /// Strategy used when the caller expresses no preference.
    pub default_strategy: SearchStrategy,
    /// Hybrid-strategy classification policy.
    pub complexity: ComplexityPolicy,
    /// Table/column mapping consumed by the store adapter.
    pub mapping: TableMapping,
}

impl GimbalConfig {
    /// Create a configuration with conservative defaults around the given
    /// mapping.
    pub fn new(mapping: TableMapping) -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            health_ttl: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(2),
            backend_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(300),
            default_strategy: SearchStrategy::CacheFirst,
            complexity: ComplexityPolicy::default(),
            mapping,
        }
    }

    /// Set the breaker failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the breaker recovery timeout.
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the health status TTL.
    pub fn with_health_ttl(mut self, ttl: Duration) -> Self {
        self.health_ttl = ttl;
        self
    }

    /// Set the probe deadline.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the backend call deadline.
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the write-through cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the default strategy.
    pub fn with_default_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Set the hybrid complexity policy.
    pub fn with_complexity(mut self, complexity: ComplexityPolicy) -> Self {
        self.complexity = complexity;
        self
    }

    /// Validate the configuration.
    ///
    /// Checks thresholds and durations are positive, the complexity pattern
    /// compiles, and the table mapping names valid identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "failure_threshold".to_string(),
                value: self.failure_threshold.to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        for (field, duration) in [
            ("recovery_timeout", self.recovery_timeout),
            ("health_ttl", self.health_ttl),
            ("probe_timeout", self.probe_timeout),
            ("backend_timeout", self.backend_timeout),
            ("cache_ttl", self.cache_ttl),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", duration),
                    reason: "must be positive".to_string(),
                });
            }
        }

        if self.complexity.max_simple_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "complexity.max_simple_length".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if let Err(e) = Regex::new(&self.complexity.operator_pattern) {
            return Err(ConfigError::InvalidValue {
                field: "complexity.operator_pattern".to_string(),
                value: self.complexity.operator_pattern.clone(),
                reason: format!("pattern does not compile: {}", e),
            });
        }

        self.mapping.validate()
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================
