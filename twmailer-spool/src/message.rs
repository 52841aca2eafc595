use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use twmailer_common::{FieldError, Identity};

use crate::error::SerializationError;

/// Maximum length of a subject line, in bytes.
pub const MAX_SUBJECT_LEN: usize = 80;

/// A message subject: 1 to 80 bytes on a single line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Validate `value` as a subject.
    ///
    /// # Errors
    /// If `value` is empty, longer than 80 bytes, or contains a line break.
    pub fn parse(value: &str) -> Result<Self, FieldError> {
        const FIELD: &str = "subject";

        if value.is_empty() {
            return Err(FieldError::Empty { field: FIELD });
        }

        if value.len() > MAX_SUBJECT_LEN {
            return Err(FieldError::TooLong {
                field: FIELD,
                len: value.len(),
                max: MAX_SUBJECT_LEN,
            });
        }

        if let Some(found) = value.chars().find(|c| matches!(c, '\r' | '\n')) {
            return Err(FieldError::InvalidCharacter { field: FIELD, found });
        }

        Ok(Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for Subject {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.0
    }
}

/// One stored message
///
/// On disk a message is a UTF-8 text file with one field per line:
///
/// ```text
/// sender
/// receiver
/// subject
/// body line 1
/// body line 2
/// ```
///
/// Every line, including the last body line, ends with `\n`. A message
/// with no body lines is three lines long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Identity,
    pub receiver: Identity,
    pub subject: Subject,
    pub body: Vec<String>,
}

impl Message {
    #[must_use]
    pub const fn new(
        sender: Identity,
        receiver: Identity,
        subject: Subject,
        body: Vec<String>,
    ) -> Self {
        Self {
            sender,
            receiver,
            subject,
            body,
        }
    }

    /// Size of the body as it travels on the wire, one `\n` per line.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.iter().map(|line| line.len() + 1).sum()
    }

    /// Render this message in its on-disk record layout.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut record = String::with_capacity(
            self.sender.len() + self.receiver.len() + self.subject.len() + 3 + self.body_len(),
        );

        for line in [self.sender.as_str(), self.receiver.as_str(), self.subject.as_str()]
            .into_iter()
            .chain(self.body.iter().map(String::as_str))
        {
            record.push_str(line);
            record.push('\n');
        }

        record
    }

    /// Parse a record written by [`Message::encode`].
    ///
    /// # Errors
    /// If a header line is missing or does not hold a valid value.
    pub fn decode(record: &str) -> Result<Self, SerializationError> {
        let mut lines = record.split_terminator('\n');

        let sender = lines
            .next()
            .ok_or(SerializationError::MissingField("sender"))?;
        let receiver = lines
            .next()
            .ok_or(SerializationError::MissingField("receiver"))?;
        let subject = lines
            .next()
            .ok_or(SerializationError::MissingField("subject"))?;

        Ok(Self {
            sender: Identity::parse(sender)?,
            receiver: Identity::parse(receiver)?,
            subject: Subject::parse(subject)?,
            body: lines.map(str::to_owned).collect(),
        })
    }

    /// Read only the subject of a record, without decoding the body.
    ///
    /// # Errors
    /// If the record has fewer than three lines or the subject is invalid.
    pub fn decode_subject(record: &str) -> Result<Subject, SerializationError> {
        let subject = record
            .split_terminator('\n')
            .nth(2)
            .ok_or(SerializationError::MissingField("subject"))?;

        Ok(Subject::parse(subject)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn message(body: &[&str]) -> Message {
        Message::new(
            Identity::parse("alice").unwrap(),
            Identity::parse("bob").unwrap(),
            Subject::parse("hi").unwrap(),
            body.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_subject_bounds() {
        assert!(Subject::parse("x").is_ok());
        assert!(Subject::parse(&"x".repeat(MAX_SUBJECT_LEN)).is_ok());
        assert_eq!(
            Subject::parse(""),
            Err(FieldError::Empty { field: "subject" })
        );
        assert!(matches!(
            Subject::parse(&"x".repeat(MAX_SUBJECT_LEN + 1)),
            Err(FieldError::TooLong { len: 81, .. })
        ));
        assert!(Subject::parse("two\nlines").is_err());
    }

    #[test]
    fn test_encodes_header_then_body() {
        assert_eq!(
            message(&["hello", "", "world"]).encode(),
            "alice\nbob\nhi\nhello\n\nworld\n"
        );
        assert_eq!(message(&[]).encode(), "alice\nbob\nhi\n");
    }

    #[test]
    fn test_decode_keeps_blank_and_trailing_lines() {
        let original = message(&["", "hello", "", "carriage\r", ""]);
        assert_eq!(Message::decode(&original.encode()).unwrap(), original);
    }

    #[test]
    fn test_decode_rejects_truncated_records() {
        assert!(matches!(
            Message::decode("alice\nbob\n"),
            Err(SerializationError::MissingField("subject"))
        ));
        assert!(matches!(
            Message::decode(""),
            Err(SerializationError::MissingField("sender"))
        ));
        assert!(matches!(
            Message::decode("Alice\nbob\nhi\n"),
            Err(SerializationError::InvalidField(_))
        ));
    }

    #[test]
    fn test_subject_only_decode() {
        let record = message(&["body"]).encode();
        assert_eq!(Message::decode_subject(&record).unwrap().as_str(), "hi");
    }

    #[test]
    fn test_body_len_counts_line_breaks() {
        assert_eq!(message(&["hello", ""]).body_len(), 7);
    }
}
