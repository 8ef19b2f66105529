//! Error types for the modguard enforcement system.
//!
//! This module provides the error hierarchy for every stage of an enforcement
//! run: specification loading, session channel I/O, the out-of-band REST API,
//! and the reconciliation loop itself.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the modguard enforcement system.
#[derive(Debug, Error)]
pub enum ModGuardError {
    /// Command-specification and node-configuration errors.
    #[error("Specification error: {0}")]
    Spec(#[from] SpecError),

    /// Session channel errors.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Appliance REST API errors.
    #[error("REST API error: {0}")]
    Rest(#[from] RestError),

    /// Enforcement errors.
    #[error("Enforcement error: {0}")]
    Enforce(#[from] EnforceError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command-specification and node-configuration errors.
///
/// These fail fast, before any device interaction, so callers can distinguish
/// "bad input" from "device disagreed".
#[derive(Debug, Error)]
pub enum SpecError {
    /// The specification file was not found.
    #[error("Specification file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The specification file could not be parsed.
    #[error("Failed to parse specification: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The specification yielded no usable command records.
    ///
    /// An empty expectation map would make every verification trivially
    /// "no drift", masking a mis-supplied file.
    #[error("Empty list of commands in specification: {}", path.display())]
    EmptyCommandSet {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// Node configuration validation failed.
    #[error("Node configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A pattern-database vendor name is not on the allow-list.
    #[error("Unknown pattern-database vendor: {name} (expected one of {allowed})")]
    UnknownVendor {
        /// The rejected vendor name.
        name: String,
        /// The allowed vendor names, comma separated.
        allowed: String,
    },
}

/// Session channel errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening the channel to the device failed.
    #[error("Failed to open session to {host}: {message}")]
    OpenFailed {
        /// The target host.
        host: String,
        /// Description of the failure.
        message: String,
    },

    /// A command could not be executed on the channel.
    #[error("Command '{command}' failed: {message}")]
    ExecFailed {
        /// The command that was being executed.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// The transport helper exited abnormally.
    #[error("Transport helper exited with {status}: {stderr}")]
    HelperFailed {
        /// The helper's exit status.
        status: String,
        /// Captured standard error output.
        stderr: String,
    },

    /// No transport helper is configured for this node.
    #[error("No transport helper configured for node {component}")]
    NoTransport {
        /// Component name of the node.
        component: String,
    },
}

/// Appliance REST API errors.
#[derive(Debug, Error)]
pub enum RestError {
    /// Authentication failed.
    #[error("Appliance authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Appliance API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the appliance.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with appliance: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the appliance.
    #[error("Invalid response from appliance API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Enforcement errors.
#[derive(Debug, Error)]
pub enum EnforceError {
    /// Maximum retry attempts exceeded without convergence.
    #[error("Maximum retry attempts ({attempts}) exceeded for {operation}")]
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// Operation that failed to converge.
        operation: String,
    },

    /// Upgrade precondition failed: target build not greater than current.
    #[error("Requested build {requested} is not greater than the running build {current}")]
    UpgradePrecondition {
        /// Currently booted build number.
        current: i64,
        /// Requested target build number.
        requested: i64,
    },

    /// Firmware download polling bound exhausted.
    #[error("Image fetch timed out: {last_status}")]
    UpgradeTimeout {
        /// Last status message reported by the appliance.
        last_status: String,
    },
}

/// Result type alias for modguard operations.
pub type Result<T> = std::result::Result<T, ModGuardError>;

impl ModGuardError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Rest(RestError::NetworkError { .. }))
    }
}

impl SpecError {
    /// Creates a parse error without a source location.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }
}

impl SessionError {
    /// Creates an exec error for the given command.
    #[must_use]
    pub fn exec(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl RestError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
