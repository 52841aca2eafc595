//! Error types for the twmailer-spool crate.
//!
//! Storage failures are kept apart from "no such message" so callers can
//! log the former while treating the latter as an ordinary outcome.

use std::io;

use thiserror::Error;
use twmailer_common::{FieldError, Identity};

use crate::MessageNumber;

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (directory create, file read/write/rename/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored record or counter could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// No message with that number exists in the mailbox.
    #[error("Message {number} not found in mailbox {mailbox}")]
    NotFound {
        mailbox: Identity,
        number: MessageNumber,
    },

    /// Spool root or configuration validation failed.
    #[error("Spool validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (capacity exhausted, number space exhausted, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Record and counter decoding errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The record ended before the named header field.
    #[error("Record is missing the {0} field")]
    MissingField(&'static str),

    /// A header field holds a value that is not allowed there.
    #[error("Record has an invalid field: {0}")]
    InvalidField(#[from] FieldError),

    /// The per-mailbox counter file does not hold a message number.
    #[error("Corrupted message counter: {0:?}")]
    CorruptCounter(String),
}

/// Spool root validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Spool path is not a directory.
    #[error("Spool path is not a directory: {0}")]
    NotDirectory(String),

    /// Invalid spool configuration.
    #[error("Invalid spool configuration: {0}")]
    InvalidConfiguration(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let store_err: StoreError = io_err.into();

        assert!(matches!(store_err, StoreError::Io(_)));
        assert!(!store_err.is_not_found());
        assert!(store_err.to_string().contains("access denied"));
    }

    #[test]
    fn test_not_found_names_mailbox_and_number() {
        let err = StoreError::NotFound {
            mailbox: Identity::parse("bob").unwrap(),
            number: MessageNumber::new(3).unwrap(),
        };

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Message 3 not found in mailbox bob");
    }
}
