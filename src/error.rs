//! # Error Handling
//!
//! Custom error type for everything around the playback buffer: configuration, sessions and the
//! inbound signal protocol.
//!
//! ## What is NOT an error:
//! The buffer itself has no failure modes. A write always succeeds and a read always returns a
//! full block, degrading to silence. Starvation shows up as an underflow count in the playback
//! stats, never as an `AppError`.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of error
//! - **Data**: Each variant carries a human-readable message
//! - **Pattern matching**: Use `match` to handle different error types
//!
//! ### Traits for Error Conversion
//! - **From trait**: Automatically converts library errors with `?`
//! - **Display trait**: Defines how errors are formatted as strings
//! - **std::error::Error**: Lets `AppError` flow into `anyhow::Error` at the top level

use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Unexpected failures (I/O, poisoned state, etc.)
/// - **BadRequest**: An inbound frame couldn't even be parsed
/// - **NotFound**: A session ID doesn't exist
/// - **ConfigError**: Configuration file or environment problems
/// - **ValidationError**: Configuration values failed validation
/// - **SessionError**: Session limit reached or an invalid lifecycle transition
/// - **SignalError**: A parsed frame isn't a signal we understand
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::SessionError("Maximum concurrent sessions (4) reached".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ConfigError(String),
    ValidationError(String),
    SessionError(String),
    SignalError(String),
}

impl AppError {
    /// Machine-readable error code, used as a structured logging field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::SessionError(_) => "session_error",
            AppError::SignalError(_) => "signal_error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::SessionError(msg) => write!(f, "Session error: {}", msg),
            AppError::SignalError(msg) => write!(f, "Signal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error, it automatically becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Automatic conversion from JSON parsing errors to AppError.
///
/// ## Why BadRequest:
/// JSON parsing errors come from upstream sending malformed frames, not from a fault here.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Automatic conversion from configuration errors to AppError.
///
/// ## When this happens:
/// - config.toml file has invalid syntax
/// - An APP_ environment variable can't be parsed into its field type
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Type alias for Results that use our custom error type.
///
/// ## Rust Concepts:
/// - **type alias**: Creates a new name for an existing type
/// - **Generic type**: `T` can be any type (String, AppConfig, etc.)
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_code() {
        let err = AppError::SessionError("limit reached".to_string());
        assert_eq!(err.to_string(), "Session error: limit reached");
        assert_eq!(err.code(), "session_error");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_into_anyhow() {
        let err: anyhow::Error = AppError::NotFound("session abc".to_string()).into();
        assert!(err.to_string().contains("session abc"));
    }
}
