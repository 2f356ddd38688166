//! Error types for Bastion backend calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed backend call.
///
/// Produced by the backend adapter that saw the failure, so callers never
/// have to inspect message text to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend could not be reached (DNS, refused, reset, timeout,
    /// gateway errors). Pauses the write queue.
    Connectivity,
    /// The backend rejected the payload.
    Validation,
    /// The write conflicts with existing data (duplicate key, etc).
    Conflict,
    /// Authentication or authorization failed.
    Permission,
    /// The addressed record does not exist.
    NotFound,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Short lower-case name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a backend call or a queued operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    /// What went wrong, structurally.
    pub kind: ErrorKind,
    /// Human-readable detail from the backend or transport.
    pub message: String,
}

impl BackendError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The backend could not be reached.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, message)
    }

    /// The backend rejected the payload.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// The addressed record does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Unclassified failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this failure means the backend is unreachable.
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BackendError::connectivity("connection refused");
        assert_eq!(err.to_string(), "connectivity error: connection refused");
    }

    #[test]
    fn classification_is_structural_not_textual() {
        // The message mentions "network" but the adapter said validation.
        let err = BackendError::validation("network_id must be set");
        assert!(!err.is_connectivity());

        let err = BackendError::new(ErrorKind::Connectivity, "upstream said no");
        assert!(err.is_connectivity());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BackendError>();
    }
}
