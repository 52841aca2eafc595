use std::borrow::Cow;

use twmailer_spool::Subject;

use crate::command::END_OF_BODY;

/// Reply to one command, as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Err,
    /// LIST: message count, then one subject per message.
    Listing(Vec<Subject>),
    /// READ: `OK`, the body lines, then a lone `.`.
    Message(Vec<String>),
}

impl Reply {
    /// Every line of this reply, without terminators.
    #[must_use]
    pub fn lines(&self) -> Vec<Cow<'_, str>> {
        match self {
            Self::Ok => vec![Cow::Borrowed("OK")],
            Self::Err => vec![Cow::Borrowed("ERR")],
            Self::Listing(subjects) => std::iter::once(Cow::Owned(subjects.len().to_string()))
                .chain(subjects.iter().map(|subject| Cow::Borrowed(subject.as_str())))
                .collect(),
            Self::Message(body) => std::iter::once(Cow::Borrowed("OK"))
                .chain(body.iter().map(|line| Cow::Borrowed(line.as_str())))
                .chain(std::iter::once(Cow::Borrowed(END_OF_BODY)))
                .collect(),
        }
    }
}
