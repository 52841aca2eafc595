pub mod protocol;

pub use self::protocol::{Protocol, SessionHandler};
