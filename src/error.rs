//! Error types for the legacy SQL Server adapter
//!
//! Every failure path returns a typed [`Error`] carrying enough context
//! (offending fields, elapsed wait) for the host engine to report it.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad or missing configuration field (never retried)
    Validation,
    /// Malformed endpoint string
    ConnectionBuild,
    /// Acquire exceeded its wait budget (retriable)
    PoolTimeout,
    /// Borrowed connection failed its liveness check
    ValidationQuery,
    /// Could not reach or authenticate against the server (retriable)
    Connectivity,
    /// Pool has been shut down
    PoolClosed,
    /// Dialect rule definition could not be loaded
    RuleDefinition,
    /// Configuration source could not be read
    Config,
    /// Value has no literal form on this server
    UnsupportedLiteral,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::PoolTimeout | Self::Connectivity)
    }
}

/// A single rejected configuration field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Field name as it appears on the configuration surface
    pub field: &'static str,
    /// Why the value was rejected
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// All violations found while validating one configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Names of every offending field, in surface order
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Main error type for the adapter
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    Validation(ValidationError),

    /// Endpoint string could not be turned into a driver configuration
    #[error("malformed endpoint string: {message}")]
    ConnectionBuild { message: String },

    /// No connection became available within the wait budget
    #[error("timed out after {}ms waiting for a pooled connection", .waited.as_millis())]
    PoolTimeout { waited: Duration },

    /// Liveness check on a borrowed connection failed
    #[error("validation query failed: {message}")]
    ValidationQuery { message: String },

    /// Connecting or re-connecting to the server failed
    #[error("connectivity error: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Pool was closed before or while acquiring
    #[error("connection pool is closed")]
    PoolClosed,

    /// Declarative dialect rules failed to load
    #[error("rule definition '{name}' is invalid: {message}")]
    RuleDefinition { name: String, message: String },

    /// Configuration source unreadable
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Value cannot be written as a literal for this dialect
    #[error("unsupported literal: {message}")]
    UnsupportedLiteral { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::ConnectionBuild { .. } => ErrorCategory::ConnectionBuild,
            Self::PoolTimeout { .. } => ErrorCategory::PoolTimeout,
            Self::ValidationQuery { .. } => ErrorCategory::ValidationQuery,
            Self::Connectivity { .. } => ErrorCategory::Connectivity,
            Self::PoolClosed => ErrorCategory::PoolClosed,
            Self::RuleDefinition { .. } => ErrorCategory::RuleDefinition,
            Self::Config { .. } => ErrorCategory::Config,
            Self::UnsupportedLiteral { .. } => ErrorCategory::UnsupportedLiteral,
        }
    }

    /// Whether the caller may retry the failed operation
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    pub fn connection_build(message: impl Into<String>) -> Self {
        Self::ConnectionBuild {
            message: message.into(),
        }
    }

    pub fn validation_query(message: impl Into<String>) -> Self {
        Self::ValidationQuery {
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: None,
        }
    }

    pub fn connectivity_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unsupported_literal(message: impl Into<String>) -> Self {
        Self::UnsupportedLiteral {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_and_connectivity_are_retriable() {
        assert!(Error::PoolTimeout {
            waited: Duration::from_millis(10)
        }
        .is_retriable());
        assert!(Error::connectivity("down").is_retriable());
        assert!(!Error::PoolClosed.is_retriable());
        assert!(!Error::Validation(ValidationError::default()).is_retriable());
        assert!(!Error::connection_build("bad").is_retriable());
        assert!(!Error::unsupported_literal("negative time").is_retriable());
    }

    #[test]
    fn validation_error_lists_every_field() {
        let err = ValidationError {
            violations: vec![
                FieldViolation::new("host", "must not be blank"),
                FieldViolation::new("port", "must be between 1 and 65535"),
            ],
        };
        assert_eq!(err.fields(), vec!["host", "port"]);
        assert_eq!(
            Error::from(err).to_string(),
            "invalid configuration: host: must not be blank; port: must be between 1 and 65535"
        );
    }

    #[test]
    fn timeout_reports_elapsed_wait() {
        let err = Error::PoolTimeout {
            waited: Duration::from_millis(60_000),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 60000ms waiting for a pooled connection"
        );
        assert_eq!(err.category(), ErrorCategory::PoolTimeout);
    }
}
