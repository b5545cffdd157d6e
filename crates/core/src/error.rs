//! Configuration error model.

use thiserror::Error;

/// Result type used for tenant configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tenant configuration error.
///
/// These are deterministic failures detected while materializing or
/// validating configuration. They are never retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An identifier was empty or otherwise unusable.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A required field was missing or empty.
    #[error("tenant {tenant}: missing {field}")]
    MissingField { tenant: String, field: &'static str },

    /// Only one of the two polling settings was provided.
    #[error("tenant {tenant}: polling requires both interval and endpoint")]
    IncompletePolling { tenant: String },

    /// A value was present but out of range.
    #[error("tenant {tenant}: invalid {field}: {reason}")]
    InvalidValue {
        tenant: String,
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn missing(tenant: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            tenant: tenant.into(),
            field,
        }
    }

    pub fn invalid(tenant: impl Into<String>, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            tenant: tenant.into(),
            field,
            reason: reason.into(),
        }
    }
}
