use core::fmt::{self, Display, Formatter};

/// Line that ends a message body.
pub const END_OF_BODY: &str = ".";

/// A command keyword, as read from the first line of a request.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Command {
    Login,
    Send,
    List,
    Read,
    Del,
    Quit,
    Invalid(String),
}

impl Command {
    /// Whether the command needs an authenticated session.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        matches!(self, Self::Send | Self::List | Self::Read | Self::Del)
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => fmt.write_str("LOGIN"),
            Self::Send => fmt.write_str("SEND"),
            Self::List => fmt.write_str("LIST"),
            Self::Read => fmt.write_str("READ"),
            Self::Del => fmt.write_str("DEL"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) => fmt.write_str(s),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    /// Keywords match exactly, case included; surrounding whitespace is ignored.
    fn try_from(command: &str) -> Result<Self, Self::Error> {
        match command.trim() {
            "LOGIN" => Ok(Self::Login),
            "SEND" => Ok(Self::Send),
            "LIST" => Ok(Self::List),
            "READ" => Ok(Self::Read),
            "DEL" => Ok(Self::Del),
            "QUIT" => Ok(Self::Quit),
            _ => Err(Self::Invalid(command.to_owned())),
        }
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}

/// Body lines of a SEND, collected up to a size limit
///
/// Lines keep arriving after the limit is passed so the request can be
/// read to its end; they are counted but no longer kept.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Body {
    lines: Vec<String>,
    size: usize,
    limit: Option<usize>,
}

impl Body {
    /// A body that accepts at most `limit` bytes, or any size for `0`.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: (limit > 0).then_some(limit),
            ..Self::default()
        }
    }

    /// Add one line; its size counts one extra byte for the line break.
    pub fn push(&mut self, line: String) {
        self.size = self.size.saturating_add(line.len() + 1);

        if !self.is_oversized() {
            self.lines.push(line);
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub fn is_oversized(&self) -> bool {
        self.limit.is_some_and(|limit| self.size > limit)
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// A command together with every argument line the peer sent for it.
///
/// Arguments are raw text; validation happens when the request is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login {
        identity: String,
        secret: String,
    },
    Send {
        receiver: String,
        subject: String,
        body: Body,
    },
    List,
    Read {
        number: String,
    },
    Del {
        number: String,
    },
    Quit,
    Invalid(String),
}
