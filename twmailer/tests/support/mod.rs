//! Test support utilities for E2E testing
//!
//! This module provides infrastructure for end-to-end testing of twmailer,
//! allowing tests to drive a complete server over TCP.

pub mod harness;

pub use harness::TestServer;
