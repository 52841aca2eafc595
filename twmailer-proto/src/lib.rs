pub mod auth;
pub mod client;
pub mod command;
pub mod connection;
pub mod error;
pub mod session;
pub mod state;

use std::{net::SocketAddr, sync::Arc};

use serde::Deserialize;
use tokio::net::TcpStream;
use twmailer_common::{
    Signal,
    config::ServerTimeouts,
    error::{ProtocolError, SessionError},
    traits::protocol::{Protocol, SessionHandler},
};
use twmailer_spool::MailboxStore;

use crate::{
    auth::Authenticator,
    session::{Session, SessionConfig},
};

/// Largest SEND body accepted unless configured otherwise (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Shortest usable line limit: a full subject plus its line ending.
const MIN_LINE_LENGTH: usize = 82;

const fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

const fn default_max_line_length() -> usize {
    connection::DEFAULT_MAX_LINE_LENGTH
}

fn default_banner() -> String {
    "TWMailer".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct Mailer;

#[derive(Clone, Debug, Deserialize)]
pub struct MailerArgs {
    #[serde(default = "default_banner")]
    banner: String,
    #[serde(default = "default_max_message_size")]
    max_message_size: usize,
    #[serde(default = "default_max_line_length")]
    max_line_length: usize,
    #[serde(default)]
    timeouts: ServerTimeouts,
    #[serde(skip)]
    store: Option<Arc<dyn MailboxStore>>,
    #[serde(skip)]
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl Default for MailerArgs {
    fn default() -> Self {
        Self {
            banner: default_banner(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_line_length: default_max_line_length(),
            timeouts: ServerTimeouts::default(),
            store: None,
            authenticator: None,
        }
    }
}

impl MailerArgs {
    /// Create a new `MailerArgs` builder
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Set the service name shown in the greeting
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Set the largest accepted SEND body in bytes (0 = unlimited)
    #[must_use]
    pub const fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set the longest accepted protocol line in bytes
    #[must_use]
    pub const fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: ServerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the mailbox store shared by every session of the listener
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MailboxStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the authenticator shared by every session of the listener
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn banner(&self) -> &str {
        &self.banner
    }

    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Protocol for Mailer {
    type Session = Session<TcpStream>;
    type Args = MailerArgs;

    fn ty() -> &'static str {
        "TWMailer"
    }

    #[tracing::instrument(level = "trace", skip(self, stream, args))]
    fn handle(&self, stream: TcpStream, peer: SocketAddr, args: Self::Args) -> Self::Session {
        Session::create(
            stream,
            peer,
            SessionConfig::builder()
                .with_store(args.store)
                .with_authenticator(args.authenticator)
                .with_banner(args.banner)
                .with_max_message_size(args.max_message_size)
                .with_max_line_length(args.max_line_length)
                .with_timeouts(args.timeouts)
                .build(),
        )
    }

    #[tracing::instrument(level = "trace", skip(self, args))]
    fn validate(&self, args: &mut Self::Args) -> Result<(), ProtocolError> {
        if args.store.is_none() {
            return Err(ProtocolError::MissingField("store"));
        }

        if args.authenticator.is_none() {
            return Err(ProtocolError::MissingField("authenticator"));
        }

        if args.max_line_length < MIN_LINE_LENGTH {
            return Err(ProtocolError::InvalidConfiguration {
                field: "max_line_length".to_string(),
                reason: format!("must be at least {MIN_LINE_LENGTH} bytes"),
            });
        }

        if args.banner.trim().is_empty() {
            args.banner = default_banner();
        }

        Ok(())
    }
}

impl SessionHandler for Session<TcpStream> {
    async fn run(self, signal: tokio::sync::broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        Self::run(self, signal).await
    }
}

pub use state::State;
