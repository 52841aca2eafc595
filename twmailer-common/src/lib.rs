pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod listener;
pub mod logging;
pub mod traits;

pub use identity::{FieldError, Identity};
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
