//! Error types for the Rampart reconciliation system.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation: manifest loading, calls into the remote configuration
//! service, and the reconciliation state machine itself.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Rampart.
#[derive(Debug, Error)]
pub enum RampartError {
    /// Configuration and manifest errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote configuration service errors raised outside a reconciliation.
    #[error("Remote service error: {0}")]
    Service(#[from] ServiceError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The call that was in flight when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Reading the current remote state.
    Query,
    /// Creating a resource.
    Create,
    /// Updating a resource.
    Update,
    /// Deleting a resource.
    Delete,
}

/// Coarse classification of a failure, surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Zero matching records.
    NotFound,
    /// A required attribute is missing for the requested transition.
    Precondition,
    /// The appliance rejected the session credentials.
    AuthFailure,
    /// The appliance returned an error or a non-success status.
    ApiError,
    /// Network-level failure.
    TransportError,
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Two manifest entries address the same resource.
    #[error("Duplicate resource in manifest: {identity}")]
    DuplicateResource {
        /// The duplicated `Tag/name` identity.
        identity: String,
    },

    /// The appliance snapshot file could not be read or written.
    #[error("Appliance snapshot error ({path}): {message}")]
    Snapshot {
        /// Path of the snapshot file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Errors returned by a remote configuration service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// No record matched the lookup.
    #[error("No matching record for {resource}")]
    NotFound {
        /// The `Tag/name` lookup that matched nothing.
        resource: String,
    },

    /// Authentication with the appliance failed.
    #[error("Authentication failed: {message}")]
    AuthFailure {
        /// Description of the auth failure.
        message: String,
    },

    /// The appliance API returned an error.
    #[error("API error{}: {message}", code_suffix(.code.as_deref()))]
    Api {
        /// Appliance status code, if one was returned.
        code: Option<String>,
        /// Error message from the appliance.
        message: String,
    },

    /// Network-level failure talking to the appliance.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the network failure.
        message: String,
    },
}

/// Reconciliation errors.
///
/// Every variant carries the operation that was in flight and the
/// `Tag/name` of the resource being reconciled.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A required attribute is missing for the requested transition.
    #[error("{operation} {resource}: missing required attributes: {}", .missing.join(", "))]
    Precondition {
        /// Operation that could not be attempted.
        operation: Operation,
        /// Resource identity.
        resource: String,
        /// Names of the missing attributes.
        missing: Vec<String>,
    },

    /// The resource does not exist and the transition needs it to.
    #[error("{operation} {resource}: resource does not exist")]
    NotFound {
        /// Operation that could not be attempted.
        operation: Operation,
        /// Resource identity.
        resource: String,
    },

    /// The remote service call failed.
    #[error("{operation} {resource} failed: {source}{}", diagnostics_suffix(.diagnostics))]
    Service {
        /// Operation in flight.
        operation: Operation,
        /// Resource identity.
        resource: String,
        /// The underlying service error.
        source: ServiceError,
        /// Diagnostic output captured during the call.
        diagnostics: Vec<String>,
    },

    /// The call returned but the appliance did not report success.
    #[error("{operation} {resource} rejected by appliance: {status}{}", diagnostics_suffix(.diagnostics))]
    Rejected {
        /// Operation in flight.
        operation: Operation,
        /// Resource identity.
        resource: String,
        /// Status text reported by the appliance.
        status: String,
        /// Diagnostic output captured during the call.
        diagnostics: Vec<String>,
    },
}

/// Result type alias for Rampart operations.
pub type Result<T> = std::result::Result<T, RampartError>;

/// Result type alias for remote service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

fn code_suffix(code: Option<&str>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

fn diagnostics_suffix(diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(" [diagnostics: {}]", diagnostics.join(" | "))
    }
}

impl RampartError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the error category, if the error came from the service or a
    /// reconciliation.
    #[must_use]
    pub const fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Service(e) => Some(e.category()),
            Self::Reconcile(e) => Some(e.category()),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => None,
        }
    }

    /// Returns true if an outer orchestrator may retry the whole
    /// reconciliation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.category(), Some(ErrorCategory::TransportError))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl ServiceError {
    /// Creates a not-found error for the given identity.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.map(String::from),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AuthFailure { .. } => ErrorCategory::AuthFailure,
            Self::Api { .. } => ErrorCategory::ApiError,
            Self::Transport { .. } => ErrorCategory::TransportError,
        }
    }
}

impl ReconcileError {
    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Precondition { .. } => ErrorCategory::Precondition,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Service { source, .. } => source.category(),
            Self::Rejected { .. } => ErrorCategory::ApiError,
        }
    }

    /// Returns the operation that was in flight.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Precondition { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Service { operation, .. }
            | Self::Rejected { operation, .. } => *operation,
        }
    }

    /// Returns the diagnostic output captured during the failed call.
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        match self {
            Self::Service { diagnostics, .. } | Self::Rejected { diagnostics, .. } => {
                diagnostics.as_slice()
            }
            Self::Precondition { .. } | Self::NotFound { .. } => &[],
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Query => "query",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Precondition => "precondition",
            Self::AuthFailure => "auth_failure",
            Self::ApiError => "api_error",
            Self::TransportError => "transport_error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_names_operation() {
        let err = ReconcileError::NotFound {
            operation: Operation::Update,
            resource: String::from("IPHostGroup/GRP1"),
        };

        assert_eq!(err.to_string(), "update IPHostGroup/GRP1: resource does not exist");
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.operation(), Operation::Update);
    }

    #[test]
    fn test_service_error_category_passes_through() {
        let err = ReconcileError::Service {
            operation: Operation::Create,
            resource: String::from("IPHost/web-01"),
            source: ServiceError::transport("connection reset"),
            diagnostics: vec![String::from("POST IPHost")],
        };

        assert_eq!(err.category(), ErrorCategory::TransportError);
        assert!(err.to_string().contains("connection reset"));
        assert!(err.to_string().contains("[diagnostics: POST IPHost]"));
        assert!(RampartError::from(err).is_retryable());
    }

    #[test]
    fn test_api_error_display_includes_code() {
        let err = ServiceError::api(Some("502"), "Operation failed. Entity already exists.");
        assert_eq!(
            err.to_string(),
            "API error (502): Operation failed. Entity already exists."
        );

        let err = ServiceError::api(None, "bad request");
        assert_eq!(err.to_string(), "API error: bad request");
    }

    #[test]
    fn test_config_errors_have_no_category() {
        let err = RampartError::from(ConfigError::validation_general("empty"));
        assert!(err.category().is_none());
        assert!(!err.is_retryable());
    }
}
