//! Configuration types shared between the server and the client.
//!
//! - [`timeouts`]: idle, lifetime and reply timeouts

pub mod timeouts;

pub use timeouts::{ClientTimeouts, ServerTimeouts};
