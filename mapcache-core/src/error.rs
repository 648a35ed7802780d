//! Error types for mapcache operations

use crate::EntityKind;
use thiserror::Error;

/// Failures surfaced by the transport collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Could not decode response: {reason}")]
    Decode { reason: String },
}

impl TransportError {
    /// HTTP-like status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server said the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }
}

/// Entity store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity store lock poisoned")]
    LockPoisoned,

    #[error("Malformed {kind} entity: {reason}")]
    MalformedEntity { kind: EntityKind, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for mapcache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for mapcache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_status() {
        let err = TransportError::Status {
            status: 503,
            body: "upstream down".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("upstream down"));
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_transport_error_not_found() {
        let err = TransportError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        let err = TransportError::Network {
            reason: "reset".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_store_error_display_malformed() {
        let err = StoreError::MalformedEntity {
            kind: EntityKind::Task,
            reason: "missing id".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("tasks"));
        assert!(msg.contains("missing id"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "api_base_url".to_string(),
            value: "".to_string(),
            reason: "must not be empty".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("api_base_url"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn test_cache_error_from_variants() {
        let err: CacheError = StoreError::LockPoisoned.into();
        assert!(matches!(err, CacheError::Store(StoreError::LockPoisoned)));

        let err: CacheError = TransportError::Decode {
            reason: "eof".to_string(),
        }
        .into();
        assert!(format!("{}", err).starts_with("Transport error"));
    }
}
