//! # Error Handling
//!
//! This module defines the centralized error type for the `unshared-groups`
//! library. It uses the `thiserror` library to create a single `Error` enum
//! covering every failure a run can end with, each variant carrying enough
//! context (remote error code, offending identifier, underlying exception
//! text) for the caller to log or display it.
//!
//! ## Taxonomy
//!
//! - **Identifier and configuration errors** (`InvalidIdentifier`,
//!   `InvalidConfig`, `CallBudgetExceeded`): detected locally, before any
//!   network call is made.
//! - **User state** (`UserNotFound`, `UserDeactivated`, `UserUnavailable`):
//!   reported by the summary batch. Whether the first two reach the caller as
//!   errors is decided by `RunConfig::raise_on_missing_user`.
//! - **Transport failures** (`Transport`, `RemoteApplication`,
//!   `ProtocolViolation`): retried by the transport layer up to the configured
//!   bound; see [`Error::is_retryable`].
//! - **Wrapped library errors** (`Io`, `Json`, `Toml`).

use thiserror::Error;

/// Main error type for unshared-groups operations
#[derive(Error, Debug)]
pub enum Error {
    /// A user or group identifier cannot be embedded safely in a batch script.
    #[error("Invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// A run configuration value is out of range or malformed.
    #[error("Invalid configuration: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    InvalidConfig {
        message: String,
        /// Optional hint for how to fix the configuration value
        hint: Option<String>,
    },

    /// The remote service knows no user with the requested identifier.
    #[error("User {user} does not exist")]
    UserNotFound { user: String },

    /// The user exists but has been deactivated (deleted or banned).
    #[error("User {user} is deactivated ({reason})")]
    UserDeactivated { user: String, reason: String },

    /// The user exists but the service refused to list their groups or
    /// friends, typically because the profile is private.
    #[error("The {what} of user {user} are not available")]
    UserUnavailable { user: String, what: String },

    /// A network-level failure: connect or read timeout, DNS failure, refused
    /// connection, unexpected HTTP status.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The service answered with an `error` envelope.
    #[error("Remote request error: {code}. Message: {message}")]
    RemoteApplication { code: i64, message: String },

    /// The response body is not JSON, or does not have the expected shape.
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// A batch script would issue more sub-operations than one batch execution
    /// allows.
    #[error("Batch script for {target} needs {calls} calls, the limit is {limit}")]
    CallBudgetExceeded {
        target: String,
        calls: usize,
        limit: usize,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A settings file parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the transport layer should try the request again.
    ///
    /// Network failures, remote error envelopes and malformed responses all
    /// share the same retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::RemoteApplication { .. } | Error::ProtocolViolation { .. }
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::ProtocolViolation {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>, hint: Option<&str>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_decode() || err.is_body() {
            "body read failed"
        } else {
            "request failed"
        };
        Error::Transport {
            message: format!("{}: {}", kind, err),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
