use std::{fmt, num::NonZeroU64};

use twmailer_common::FieldError;

/// Extension of every stored message file.
pub const MESSAGE_EXTENSION: &str = "txt";

/// Number identifying one message inside one mailbox
///
/// Numbers are handed out by the store, start at 1 and are never reused
/// within a mailbox, so they double as the message's file name stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageNumber(NonZeroU64);

impl MessageNumber {
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// The number following this one, or `None` on overflow.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Parse a number as sent by a client: plain decimal digits, not zero.
    ///
    /// # Errors
    /// If the text has anything besides ASCII digits, or is zero or out of range.
    pub fn parse(value: &str) -> Result<Self, FieldError> {
        let not_positive = || FieldError::NotPositive {
            field: "message number",
            value: value.to_owned(),
        };

        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(not_positive());
        }

        value
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(not_positive)
    }

    /// Parse a message number from a filename like `12.txt`
    ///
    /// # Security
    /// Anything that is not digits followed by the message extension is
    /// rejected, which keeps temporary (`.tmp_*`), deleted (`*.deleted`)
    /// and bookkeeping files out of listings.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let stem = filename
            .strip_suffix(MESSAGE_EXTENSION)?
            .strip_suffix('.')?;

        Self::parse(stem).ok()
    }

    #[must_use]
    pub fn filename(self) -> String {
        format!("{}.{MESSAGE_EXTENSION}", self.0)
    }
}

impl fmt::Display for MessageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
