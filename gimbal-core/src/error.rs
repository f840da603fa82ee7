//! Error types for Gimbal operations

use crate::result::BackendKind;
use crate::Timestamp;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by backend adapters (or by the orchestrator's deadline
/// wrapper on their behalf).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport failure on {backend}: {reason}")]
    Transport { backend: BackendKind, reason: String },

    #[error("Query failed on {backend}: {reason}")]
    Query { backend: BackendKind, reason: String },

    #[error("Call to {backend} timed out after {timeout:?}")]
    Timeout {
        backend: BackendKind,
        timeout: Duration,
    },
}

impl BackendError {
    /// The backend this error was raised against.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Transport { backend, .. }
            | Self::Query { backend, .. }
            | Self::Timeout { backend, .. } => *backend,
        }
    }
}

/// Configuration errors, surfaced at construction time only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid table mapping: {reason}")]
    InvalidMapping { reason: String },
}

/// Master error type for all Gimbal operations.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Circuit open for {backend}, next retry at {retry_at}")]
    CircuitOpen {
        backend: BackendKind,
        retry_at: Timestamp,
    },

    #[error(
        "All backends failed: {primary} ({primary_reason}); fallback {fallback} ({fallback_reason})"
    )]
    AllBackendsFailed {
        primary: BackendKind,
        primary_reason: String,
        fallback: BackendKind,
        fallback_reason: String,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Gimbal operations.
pub type GimbalResult<T> = Result<T, SearchError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_backend_error_display_transport() {
        let err = BackendError::Transport {
            backend: BackendKind::Cache,
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Transport failure"));
        assert!(msg.contains("cache"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_backend_error_display_timeout() {
        let err = BackendError::Timeout {
            backend: BackendKind::Store,
            timeout: Duration::from_millis(250),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("store"));
        assert!(msg.contains("250"));
    }

    #[test]
    fn test_backend_error_backend_accessor() {
        let err = BackendError::Query {
            backend: BackendKind::Store,
            reason: "syntax".to_string(),
        };
        assert_eq!(err.backend(), BackendKind::Store);

        let err = BackendError::Timeout {
            backend: BackendKind::Cache,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.backend(), BackendKind::Cache);
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "failure_threshold".to_string(),
            value: "0".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("failure_threshold"));
        assert!(msg.contains("0"));
        assert!(msg.contains("must be greater than 0"));
    }

    #[test]
    fn test_search_error_display_circuit_open() {
        let err = SearchError::CircuitOpen {
            backend: BackendKind::Cache,
            retry_at: Utc::now(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Circuit open"));
        assert!(msg.contains("cache"));
    }

    #[test]
    fn test_search_error_display_all_backends_failed() {
        let err = SearchError::AllBackendsFailed {
            primary: BackendKind::Cache,
            primary_reason: "connection reset".to_string(),
            fallback: BackendKind::Store,
            fallback_reason: "timed out".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cache"));
        assert!(msg.contains("connection reset"));
        assert!(msg.contains("store"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_search_error_from_variants() {
        let backend = SearchError::from(BackendError::Transport {
            backend: BackendKind::Store,
            reason: "down".to_string(),
        });
        assert!(matches!(backend, SearchError::Backend(_)));

        let config = SearchError::from(ConfigError::MissingRequired {
            field: "mapping.table".to_string(),
        });
        assert!(matches!(config, SearchError::Config(_)));
    }
}
