//! Timeout configuration for both ends of the mail protocol.
//!
//! The server side bounds how long a peer may stay silent and how long a
//! single connection may live at all. The client side bounds connecting and
//! waiting for a reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server-side timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// Idle timeout applied to every line read from the peer, whether it is
    /// a command keyword or one of the command's argument lines.
    ///
    /// Default: 300 seconds (5 minutes)
    #[serde(default = "defaults::server_command_secs")]
    pub command_secs: u64,

    /// Maximum total connection duration.
    ///
    /// Default: 1800 seconds (30 minutes)
    #[serde(default = "defaults::server_connection_secs")]
    pub connection_secs: u64,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::server_command_secs(),
            connection_secs: defaults::server_connection_secs(),
        }
    }
}

impl ServerTimeouts {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_secs)
    }
}

/// Client-side timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Timeout for establishing the TCP connection.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::client_connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each reply line from the server.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::client_response_secs")]
    pub response_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::client_connect_secs(),
            response_secs: defaults::client_response_secs(),
        }
    }
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_secs)
    }
}

mod defaults {
    pub const fn server_command_secs() -> u64 {
        300 // 5 minutes
    }
    pub const fn server_connection_secs() -> u64 {
        1800 // 30 minutes
    }

    pub const fn client_connect_secs() -> u64 {
        30
    }
    pub const fn client_response_secs() -> u64 {
        60
    }
}
