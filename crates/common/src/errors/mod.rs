//! Error types for UnitForge services
//!
//! Provides a single error type for the store and the gateway with:
//! - Distinct variants for every unit failure mode
//! - HTTP status code mapping
//! - Structured error responses
//! - Classification of raw storage errors (unique / foreign key)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    UnitNotFound,

    // Conflict errors (5xxx)
    AmbiguousResult,
    DuplicateCode,
    UnitInUse,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SeedExhausted,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::UnitNotFound => 4001,

            ErrorCode::AmbiguousResult => 5001,
            ErrorCode::DuplicateCode => 5002,
            ErrorCode::UnitInUse => 5003,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SeedExhausted => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Unit not found: {key}")]
    UnitNotFound { key: String },

    /// A lookup expected one row and storage returned several.
    #[error("More than one unit matches {field} = {value}")]
    Ambiguous { field: String, value: String },

    #[error("Unit with code {code} already exists")]
    DuplicateCode { code: String },

    #[error("Unit {name} cannot be deleted because it is in use")]
    UnitInUse { name: String },

    #[error("No unit exists in the system and automatic installation failed")]
    SeedExhausted,

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnitNotFound { .. } => ErrorCode::UnitNotFound,
            AppError::Ambiguous { .. } => ErrorCode::AmbiguousResult,
            AppError::DuplicateCode { .. } => ErrorCode::DuplicateCode,
            AppError::UnitInUse { .. } => ErrorCode::UnitInUse,
            AppError::SeedExhausted => ErrorCode::SeedExhausted,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::UnitNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Ambiguous { .. }
            | AppError::DuplicateCode { .. }
            | AppError::UnitInUse { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::SeedExhausted
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Lookup misses and ambiguous lookups both mean "no usable unit"
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, AppError::UnitNotFound { .. } | AppError::Ambiguous { .. })
    }

    /// Classify an insert failure: unique violations become `DuplicateCode`
    pub fn from_insert(err: DbErr, code: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateCode {
                code: code.to_string(),
            },
            _ => AppError::Database(err),
        }
    }

    /// Classify a delete failure: foreign key violations become `UnitInUse`
    pub fn from_delete(err: DbErr, name: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::UnitInUse {
                name: name.to_string(),
            },
            _ => AppError::Database(err),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::UnitNotFound { key: "id=42".into() };
        assert_eq!(err.code(), ErrorCode::UnitNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.is_lookup_failure());
    }

    #[test]
    fn test_conflicts() {
        let in_use = AppError::UnitInUse { name: "Kilogram".into() };
        assert_eq!(in_use.status_code(), StatusCode::CONFLICT);
        assert_eq!(in_use.code().as_code(), 5003);
        assert!(in_use.is_client_error());

        let dup = AppError::DuplicateCode { code: "KG".into() };
        assert_eq!(dup.code(), ErrorCode::DuplicateCode);
        assert!(!dup.is_lookup_failure());
    }

    #[test]
    fn test_seed_exhausted_is_fatal() {
        let err = AppError::SeedExhausted;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_unclassified_db_error_stays_generic() {
        let err = AppError::from_insert(DbErr::Custom("boom".into()), "KG");
        assert_eq!(err.code(), ErrorCode::DatabaseError);

        let err = AppError::from_delete(DbErr::Custom("boom".into()), "Kilogram");
        assert!(matches!(err, AppError::Database(_)));
    }
}
