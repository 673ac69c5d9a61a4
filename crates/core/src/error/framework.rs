use super::{ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors, independent of [`ErrorCode`] — the same code
/// can surface at different severities depending on where it occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Error categories for classification, mirrors [`ErrorCode::category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    System,
    Database,
    Parsing,
    Validation,
    Resource,
}

/// The workspace's infrastructure-level error type. Domain crates (like
/// `catalog-engine`) define their own error enum for the kinds spec'd by
/// their operations and convert infrastructure failures into it via
/// `#[from]`, rather than using this type directly in public signatures.
#[derive(Debug, ThisError, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    pub context: ErrorContext,
    pub severity: ErrorSeverity,
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code.category() {
            "system" => ErrorCategory::System,
            "database" => ErrorCategory::Database,
            "parsing" => ErrorCategory::Parsing,
            "validation" => ErrorCategory::Validation,
            "resource" => ErrorCategory::Resource,
            _ => ErrorCategory::System,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error()
            || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    /// Full structured view, for internal logs only — never hand this to an
    /// external caller, since it may carry file paths and row/column detail.
    pub fn to_debug_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "context": self.context,
                "severity": self.severity,
                "cause": self.cause.as_ref().map(|c| c.to_debug_json())
            }
        })
    }

    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange
            | ErrorCode::ResourceNotFound
            | ErrorCode::NotFound => ErrorSeverity::Low,

            ErrorCode::DuplicateValue | ErrorCode::ResourceAlreadyExists | ErrorCode::ResourceConflict => {
                ErrorSeverity::Medium
            }

            ErrorCode::DatabaseConnectionError | ErrorCode::ServiceUnavailable | ErrorCode::ResourceExhausted => {
                ErrorSeverity::High
            }

            ErrorCode::InternalServerError
            | ErrorCode::ConfigurationError
            | ErrorCode::DatabaseTransactionError => ErrorSeverity::Critical,

            _ => ErrorSeverity::Medium,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        ErrorSer {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        }
        .serialize(serializer)
    }
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    ErrorCode::DatabaseConstraintViolation
                } else {
                    ErrorCode::DatabaseQueryError
                }
            }
            sqlx::Error::PoolTimedOut => ErrorCode::DatabaseConnectionError,
            sqlx::Error::Io(_) => ErrorCode::DatabaseConnectionError,
            _ => ErrorCode::DatabaseQueryError,
        };

        Self::new(code, err.to_string()).add_trace("sqlx::Error conversion")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
            .add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = Error::not_found("product 42");
        assert_eq!(err.to_string(), "[ResourceNotFound] product 42");
    }

    #[test]
    fn default_severity_matches_code() {
        assert_eq!(Error::validation("x").severity, ErrorSeverity::Low);
        assert_eq!(Error::internal("x").severity, ErrorSeverity::Critical);
    }

    #[test]
    fn sqlx_unique_violation_maps_to_constraint_violation() {
        // PoolTimedOut doesn't require a live connection to construct.
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.code, ErrorCode::DatabaseConnectionError);
    }
}
