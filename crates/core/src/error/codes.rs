use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized, business-agnostic error codes shared by every crate in the
/// workspace. These classify *technical* failure categories — the
/// domain-specific error kinds (`InvalidInput`, `UnknownUnit`,
/// `ParseFailure`, ...) live in `catalog_engine::error` and convert from
/// these where appropriate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General system errors (1000-1999)
    InternalServerError = 1000,
    ConfigurationError = 1001,
    ServiceUnavailable = 1002,
    Timeout = 1003,
    ResourceExhausted = 1004,

    // Database errors (2000-2999)
    DatabaseConnectionError = 2000,
    DatabaseConstraintViolation = 2001,
    DatabaseTransactionError = 2002,
    DatabaseQueryError = 2003,

    // Serialization / parsing errors (3000-3999)
    SerializationError = 3000,
    ParseFailure = 3001,

    // Input validation errors (5000-5999)
    ValidationFailed = 5000,
    InvalidInput = 5001,
    MissingRequiredField = 5002,
    InvalidFormat = 5003,
    ValueOutOfRange = 5004,
    DuplicateValue = 5005,

    // Resource management errors (6000-6999)
    ResourceNotFound = 6000,
    ResourceAlreadyExists = 6001,
    ResourceConflict = 6002,
    NotFound = 6005,
    NotImplemented = 6006,
}

impl ErrorCode {
    /// Coarse category used for log fields and dashboards.
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InternalServerError
            | ErrorCode::ConfigurationError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::ResourceExhausted
            | ErrorCode::NotImplemented => "system",

            ErrorCode::DatabaseConnectionError
            | ErrorCode::DatabaseConstraintViolation
            | ErrorCode::DatabaseTransactionError
            | ErrorCode::DatabaseQueryError => "database",

            ErrorCode::SerializationError | ErrorCode::ParseFailure => "parsing",

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange
            | ErrorCode::DuplicateValue => "validation",

            ErrorCode::ResourceNotFound
            | ErrorCode::ResourceAlreadyExists
            | ErrorCode::ResourceConflict
            | ErrorCode::NotFound => "resource",
        }
    }

    /// Whether the underlying condition is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServiceUnavailable
                | ErrorCode::DatabaseConnectionError
                | ErrorCode::Timeout
                | ErrorCode::ResourceExhausted
        )
    }

    /// Whether this error represents a genuine bug/outage (`error!`) versus
    /// an expected condition (`warn!`/`info!`).
    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::ValidationFailed
                | ErrorCode::InvalidInput
                | ErrorCode::MissingRequiredField
                | ErrorCode::InvalidFormat
                | ErrorCode::ValueOutOfRange
                | ErrorCode::ResourceNotFound
                | ErrorCode::NotFound
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
