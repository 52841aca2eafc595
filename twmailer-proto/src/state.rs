use core::fmt::{self, Display, Formatter};

use twmailer_common::Identity;

/// Authentication state of one session.
///
/// A session starts unauthenticated and moves to `Authenticated` on the
/// first successful LOGIN. There is no way back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Unauthenticated,
    Authenticated(Identity),
}

impl State {
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Unauthenticated => None,
            Self::Authenticated(identity) => Some(identity),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => fmt.write_str("Unauthenticated"),
            Self::Authenticated(identity) => write!(fmt, "Authenticated({identity})"),
        }
    }
}
