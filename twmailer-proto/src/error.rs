//! Error types for the twmailer protocol.
//!
//! [`ConnectionError`] ends a connection, [`CommandError`] ends a single
//! command with an `ERR` reply, and [`ClientError`] is what the protocol
//! client reports to its caller.

use std::io;

use thiserror::Error;
use twmailer_common::{FieldError, error::SessionError};
use twmailer_spool::StoreError;

/// Transport failures. None of these can be answered on the wire.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O error during connection operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection was closed by peer.
    #[error("Connection closed by peer")]
    Closed,

    /// The peer sent a line longer than allowed.
    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// No complete line arrived in time.
    #[error("No line received within {0} seconds")]
    Timeout(u64),
}

impl From<ConnectionError> for SessionError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Io(err) => Self::Connection(err),
            ConnectionError::Closed => Self::Connection(io::ErrorKind::UnexpectedEof.into()),
            ConnectionError::LineTooLong { .. } => Self::Protocol(err.to_string()),
            ConnectionError::Timeout(secs) => Self::Timeout(secs),
        }
    }
}

/// Why a single command was answered with `ERR`.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command requires a successful LOGIN")]
    Unauthenticated,

    #[error("Session is already authenticated")]
    AlreadyAuthenticated,

    #[error("Credentials rejected")]
    Rejected,

    #[error("Invalid argument: {0}")]
    Validation(#[from] FieldError),

    #[error("Message body of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("No such message")]
    NotFound,

    #[error("Storage failure: {0}")]
    Storage(StoreError),

    #[error("Unknown command {0:?}")]
    Unknown(String),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else {
            Self::Storage(err)
        }
    }
}

/// Errors reported by [`crate::client::Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Timed out connecting to {address} after {secs} seconds")]
    ConnectTimeout { address: String, secs: u64 },

    #[error("Unexpected reply from server: {0:?}")]
    UnexpectedReply(String),

    #[error("A body line consisting of a single '.' would end the message early")]
    InvalidBody,

    #[error("Invalid argument: {0}")]
    Validation(#[from] FieldError),
}

/// Specialized `Result` type for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use twmailer_common::Identity;
    use twmailer_spool::MessageNumber;

    use super::*;

    #[test]
    fn test_connection_error_display() {
        assert_eq!(
            ConnectionError::Closed.to_string(),
            "Connection closed by peer"
        );
        assert_eq!(
            ConnectionError::LineTooLong { limit: 8192 }.to_string(),
            "Line exceeds 8192 bytes"
        );
    }

    #[test]
    fn test_session_error_conversion() {
        assert!(matches!(
            SessionError::from(ConnectionError::Timeout(5)),
            SessionError::Timeout(5)
        ));
        assert!(matches!(
            SessionError::from(ConnectionError::LineTooLong { limit: 1 }),
            SessionError::Protocol(_)
        ));
        assert!(matches!(
            SessionError::from(ConnectionError::Closed),
            SessionError::Connection(err) if err.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn test_store_error_conversion_keeps_not_found_apart() {
        let not_found = StoreError::NotFound {
            mailbox: Identity::parse("bob").unwrap(),
            number: MessageNumber::FIRST,
        };
        assert!(matches!(
            CommandError::from(not_found),
            CommandError::NotFound
        ));

        let io = StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(CommandError::from(io), CommandError::Storage(_)));
    }
}
