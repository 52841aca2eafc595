pub mod config;
pub mod controller;

pub use controller::{SHUTDOWN_BROADCAST, Twmailer};
