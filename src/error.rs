//! Error types for the record store and the services built on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Code the record store attaches to a field whose value collides with a
/// unique index.
pub const NOT_UNIQUE: &str = "validation_not_unique";

/// Per-field rejection detail returned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

/// Errors that can occur while talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, FieldError>,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// True when the store rejected a write because `field` must be unique.
    pub fn is_unique_violation(&self, field: &str) -> bool {
        match self {
            StoreError::Validation { fields, .. } => fields
                .get(field)
                .map(|detail| detail.code == NOT_UNIQUE)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn not_unique(field: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            field.to_string(),
            FieldError {
                code: NOT_UNIQUE.to_string(),
                message: "Value must be unique.".to_string(),
            },
        );
        StoreError::Validation {
            message: "Failed to create record.".to_string(),
            fields,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Deserialize(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by the booking, content and payment services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{date} {time} is already confirmed for another appointment")]
    SlotTaken { date: String, time: String },

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_matches_only_the_named_field() {
        let err = StoreError::not_unique("key");
        assert!(err.is_unique_violation("key"));
        assert!(!err.is_unique_violation("slug"));
        assert!(!StoreError::NotFound("x".into()).is_unique_violation("key"));
    }

    #[test]
    fn service_error_sees_through_store_not_found() {
        let err: ServiceError = StoreError::NotFound("appointments/abc".into()).into();
        assert!(err.is_not_found());
        assert!(!ServiceError::InvalidInput("x".into()).is_not_found());
    }
}
