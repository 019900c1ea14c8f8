//! Error types and handling for Wattson
//!
//! This module defines the error taxonomy shared by the login flow, the token
//! manager and the data pipeline. Every public entry point returns either a
//! value or one of these variants; nothing is allowed to panic its way out to
//! the scheduler.

use thiserror::Error;

/// Result type alias for Wattson operations
pub type Result<T> = std::result::Result<T, WattsonError>;

/// Maximum number of characters of a response body kept for diagnostics
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Main error type for Wattson
#[derive(Debug, Error)]
pub enum WattsonError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Transport-level failures (connect, timeout, TLS)
    #[error("Network error: {message}")]
    Network { message: String },

    /// A token, cookie or redirect the login flow depends on was not found
    #[error("Login flow changed: could not find {artifact} ({message})")]
    FlowShape { artifact: String, message: String },

    /// Credential submission or confirmation rejected
    #[error("Login failed: HTTP {status}: {body}")]
    LoginFailed { status: u16, body: String },

    /// Authorization code exchange rejected by the token endpoint
    #[error("Token exchange failed: HTTP {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// Refresh-token grant rejected
    #[error("Token refresh failed: HTTP {status}: {body}")]
    RefreshFailed { status: u16, body: String },

    /// Data endpoint failed or returned an unexpected shape
    #[error("Fetch failed: {message}")]
    FetchFailed { message: String },
}

impl WattsonError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        WattsonError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        WattsonError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        WattsonError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        WattsonError::Network {
            message: message.into(),
        }
    }

    /// Create a new flow-shape error for a missing login artifact
    pub fn flow_shape<S: Into<String>>(artifact: S, message: S) -> Self {
        WattsonError::FlowShape {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Create a new login error; the body is truncated for diagnostics
    pub fn login_failed(status: u16, body: &str) -> Self {
        WattsonError::LoginFailed {
            status,
            body: excerpt(body),
        }
    }

    /// Create a new token exchange error; the body is truncated for diagnostics
    pub fn token_exchange_failed(status: u16, body: &str) -> Self {
        WattsonError::TokenExchangeFailed {
            status,
            body: excerpt(body),
        }
    }

    /// Create a new refresh error; the body is truncated for diagnostics
    pub fn refresh_failed(status: u16, body: &str) -> Self {
        WattsonError::RefreshFailed {
            status,
            body: excerpt(body),
        }
    }

    /// Create a new fetch error
    pub fn fetch<S: Into<String>>(message: S) -> Self {
        WattsonError::FetchFailed {
            message: message.into(),
        }
    }

    /// Whether this error came out of the login/token path
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            WattsonError::FlowShape { .. }
                | WattsonError::LoginFailed { .. }
                | WattsonError::TokenExchangeFailed { .. }
                | WattsonError::RefreshFailed { .. }
        )
    }
}

/// First `BODY_EXCERPT_CHARS` characters of a response body
pub fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

impl From<std::io::Error> for WattsonError {
    fn from(err: std::io::Error) -> Self {
        WattsonError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for WattsonError {
    fn from(err: serde_yaml::Error) -> Self {
        WattsonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for WattsonError {
    fn from(err: serde_json::Error) -> Self {
        WattsonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for WattsonError {
    fn from(err: reqwest::Error) -> Self {
        WattsonError::network(err.to_string())
    }
}

impl From<url::ParseError> for WattsonError {
    fn from(err: url::ParseError) -> Self {
        WattsonError::config(format!("Invalid URL: {err}"))
    }
}
