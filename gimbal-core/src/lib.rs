//! Gimbal Core - Shared Types and Backend Contracts
//!
//! Data shapes, error taxonomy, configuration, and the two capability
//! contracts backends must satisfy. The routing behavior lives in
//! `gimbal-engine`; this crate carries no business logic beyond validation
//! and small helpers.

pub mod circuit;
pub mod config;
pub mod contracts;
pub mod error;
pub mod filter;
pub mod health;
pub mod query;
pub mod result;

pub use circuit::{CircuitSnapshot, CircuitState};
pub use config::{ComplexityPolicy, GimbalConfig, TableMapping, DEFAULT_OPERATOR_PATTERN};
pub use contracts::{CacheKey, SearchCache, SearchStore};
pub use error::{BackendError, ConfigError, GimbalResult, SearchError};
pub use filter::{AllowAll, GovernanceFilter, SecurityContext};
pub use health::{HealthStatus, HealthVerdict};
pub use query::{FilterMap, SearchOptions, SearchQuery, SearchStrategy};
pub use result::{
    BackendKind, CachedPayload, Performance, ResultItem, RouteReason, SearchResult, StrategyTrace,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
