//! Error types shared by every protocol crate.
//!
//! These cover the life of a listener (binding, accepting) and of a single
//! session (why a connection loop ended).

use std::io;

use thiserror::Error;

/// Errors raised while validating a protocol's listener arguments at startup.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required runtime dependency was never provided.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

/// Reasons a session loop ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to initialise the session.
    #[error("Session initialization failed: {0}")]
    InitFailed(String),

    /// The peer violated the framing rules (e.g. an over-long line).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection error occurred.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// Shutdown signal received.
    #[error("Shutdown requested")]
    Shutdown,

    /// Session timed out.
    #[error("Session timed out after {0} seconds")]
    Timeout(u64),
}

impl SessionError {
    /// Returns `true` if the error indicates a graceful shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Returns `true` if the error is a client-side issue.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }
}

/// Errors that can occur in the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to socket address.
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The session limiter was closed underneath the listener.
    #[error("Session limiter closed")]
    LimiterClosed,
}
