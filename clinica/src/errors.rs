use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error as ThisError;

/// Machine-readable reason attached to validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    MissingField,
    UniqueConflict,
    BadEnumValue,
    NegativeQuantity,
    InvalidReference,
    IdMismatch,
    MalformedBody,
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or credentials rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated but the caller's role does not allow the operation
    #[error("{message}")]
    Forbidden { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Input failed a validation constraint, with a machine-readable reason
    #[error("{message}")]
    Validation { reason: ValidationReason, message: String },

    /// Requested resource not found
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    /// Concurrent-modification conflict
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                // Uniqueness is an input-validation failure in this API, not a 409:
                // 409 is reserved for the optimistic-concurrency token.
                DbError::UniqueViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::VersionConflict => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::Validation { message, .. } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with id {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => {
                    // Friendly messages for the uniqueness rules the schema enforces
                    match (table.as_deref(), constraint.as_deref()) {
                        (Some("persons"), Some(c)) if c.contains("national_id") => {
                            "A person with this national id already exists".to_string()
                        }
                        (Some("users"), Some(c)) if c.contains("username") => "This username is already taken".to_string(),
                        (Some("insurers"), Some(c)) if c.contains("code") => {
                            "A health insurer with this code already exists".to_string()
                        }
                        (Some("insurers"), Some(c)) if c.contains("name") => {
                            "A health insurer with this name already exists".to_string()
                        }
                        (Some("specialties"), Some(c)) if c.contains("name") => {
                            "A specialty with this name already exists".to_string()
                        }
                        _ => "Resource already exists".to_string(),
                    }
                }
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::VersionConflict => "The resource was modified concurrently; re-read and retry".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Machine-readable reason included in error bodies where one applies.
    fn reason(&self) -> Option<ValidationReason> {
        match self {
            Error::Validation { reason, .. } => Some(*reason),
            Error::Database(DbError::UniqueViolation { .. }) => Some(ValidationReason::UniqueConflict),
            Error::Database(DbError::ForeignKeyViolation { .. }) => Some(ValidationReason::InvalidReference),
            Error::Database(DbError::CheckViolation { .. }) => Some(ValidationReason::NegativeQuantity),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(DbError::VersionConflict) | Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = match self.reason() {
            Some(reason) => json!({
                "success": false,
                "message": self.user_message(),
                "reason": reason,
            }),
            None => json!({
                "success": false,
                "message": self.user_message(),
            }),
        };

        (status, axum::response::Json(body)).into_response()
    }
}

/// Json body rejections surface as validation errors in the same shaped body
/// as our own checks, instead of axum's default text response.
impl From<axum::extract::rejection::JsonRejection> for Error {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        let message = rejection.body_text();
        let reason = if message.contains("unknown variant") {
            ValidationReason::BadEnumValue
        } else if message.contains("missing field") {
            ValidationReason::MissingField
        } else {
            ValidationReason::MalformedBody
        };
        Error::Validation { reason, message }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::Unauthenticated { message: None }.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Database(DbError::VersionConflict).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Database(DbError::UniqueViolation {
                constraint: None,
                table: None,
                message: "dup".into()
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Validation {
                reason: ValidationReason::IdMismatch,
                message: "path id does not match body id".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unique_violation_messages_name_the_conflict() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("persons_national_id_key".into()),
            table: Some("persons".into()),
            message: "duplicate key value".into(),
        });
        assert!(err.user_message().contains("national id"));

        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("insurers_code_key".into()),
            table: Some("insurers".into()),
            message: "duplicate key value".into(),
        });
        assert!(err.user_message().contains("code"));
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let err = Error::Database(DbError::Other(anyhow::anyhow!("connection refused to 10.0.0.3:5432")));
        assert_eq!(err.user_message(), "Database error occurred");
    }
}
