use std::{
    fmt::{self, Display},
    ops::Deref,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a user name on the wire and on disk.
pub const MAX_IDENTITY_LEN: usize = 8;

/// A field received from a peer did not satisfy its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is {len} bytes long, at most {max} allowed")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} contains invalid character {found:?}")]
    InvalidCharacter { field: &'static str, found: char },

    #[error("{field} {value:?} is not a positive integer")]
    NotPositive { field: &'static str, value: String },
}

/// A user name: 1 to 8 characters from `[a-z0-9]`.
///
/// Identities name mailbox directories, so the character set doubles as the
/// guard against path traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Validate `value` as an identity.
    ///
    /// # Errors
    /// If `value` is empty, longer than eight bytes, or contains anything
    /// other than lowercase ASCII letters and digits.
    pub fn parse(value: &str) -> Result<Self, FieldError> {
        const FIELD: &str = "identity";

        if value.is_empty() {
            return Err(FieldError::Empty { field: FIELD });
        }

        if value.len() > MAX_IDENTITY_LEN {
            return Err(FieldError::TooLong {
                field: FIELD,
                len: value.len(),
                max: MAX_IDENTITY_LEN,
            });
        }

        if let Some(found) = value
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        {
            return Err(FieldError::InvalidCharacter { field: FIELD, found });
        }

        Ok(Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for Identity {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Identity {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}
