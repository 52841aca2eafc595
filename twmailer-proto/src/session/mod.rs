use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast,
};
use twmailer_common::{
    Signal, config::ServerTimeouts, error::SessionError, internal, listener::shutdown_requested,
    outgoing, tracing,
};
use twmailer_spool::MailboxStore;

use crate::{
    State,
    auth::Authenticator,
    command::Command,
    connection::{Connection, DEFAULT_MAX_LINE_LENGTH},
    error::{ConnectionError, ConnectionResult},
};

mod events;
mod io;
mod response;

pub use response::Reply;

/// Whether the connection stays open after a command.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

#[derive(Debug)]
pub struct SessionConfig {
    pub store: Option<Arc<dyn MailboxStore>>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub banner: String,
    pub max_message_size: usize,
    pub max_line_length: usize,
    pub timeouts: ServerTimeouts,
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for `SessionConfig`
#[derive(Debug)]
pub struct SessionConfigBuilder {
    store: Option<Arc<dyn MailboxStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    banner: String,
    max_message_size: usize,
    max_line_length: usize,
    timeouts: ServerTimeouts,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            store: None,
            authenticator: None,
            banner: String::new(),
            max_message_size: 0,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            timeouts: ServerTimeouts::default(),
        }
    }
}

impl SessionConfigBuilder {
    /// Set the mailbox store messages are kept in
    #[must_use]
    pub fn with_store(mut self, store: Option<Arc<dyn MailboxStore>>) -> Self {
        self.store = store;
        self
    }

    /// Set the authenticator LOGIN is checked against
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Set the service name shown in the greeting
    #[must_use]
    pub fn with_banner(mut self, banner: String) -> Self {
        self.banner = banner;
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

    /// Set the timeout configuration for this session
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: ServerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the final `SessionConfig`
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            store: self.store,
            authenticator: self.authenticator,
            banner: self.banner,
            max_message_size: self.max_message_size,
            max_line_length: self.max_line_length,
            timeouts: self.timeouts,
        }
    }
}

/// One client connection: its transport, its authentication state and the
/// services its commands act on. Nothing here is shared with other sessions
/// except the store and the authenticator.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    peer: SocketAddr,
    pub(super) state: State,
    pub(super) connection: Connection<Stream>,
    store: Option<Arc<dyn MailboxStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    banner: Arc<str>,
    /// Largest SEND body in bytes; 0 means unlimited.
    pub(super) max_message_size: usize,
    timeouts: ServerTimeouts,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn create(stream: Stream, peer: SocketAddr, config: SessionConfig) -> Self {
        tracing::debug!("Config: {:?}", config);

        Self {
            peer,
            state: State::default(),
            connection: Connection::new(
                stream,
                config.max_line_length,
                config.timeouts.command_timeout(),
            ),
            store: config.store,
            authenticator: config.authenticator,
            banner: if config.banner.is_empty() {
                Arc::from("TWMailer")
            } else {
                config.banner.into()
            },
            max_message_size: config.max_message_size,
            timeouts: config.timeouts,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Serve the connection until the peer quits or disconnects, the
    /// connection outlives its maximum lifetime, or shutdown is signalled
    /// while waiting for the next command.
    ///
    /// # Errors
    /// If the session is missing its store or authenticator, the transport
    /// fails, the peer breaks framing, or a timeout expires
    #[tracing::instrument(level = "trace", skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let lifetime = self.timeouts.connection_secs;
        let result = tokio::time::timeout(
            self.timeouts.connection_timeout(),
            self.serve(&mut signal),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(
                peer = ?self.peer,
                max_secs = lifetime,
                "Connection exceeded maximum lifetime, closing"
            );
            Err(SessionError::Timeout(lifetime))
        });

        internal!("Connection closed");
        result
    }

    async fn serve(&mut self, signal: &mut broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        let (Some(store), Some(authenticator)) = (self.store.clone(), self.authenticator.clone())
        else {
            return Err(SessionError::InitFailed(
                "session requires a mailbox store and an authenticator".to_string(),
            ));
        };

        let greeting = format!("Welcome to {}!", self.banner);
        outgoing!("{greeting}");
        self.connection.write_line(&greeting).await?;

        loop {
            let line = tokio::select! {
                () = shutdown_requested(signal) => {
                    internal!(level = INFO, "Server shutting down, closing idle connection");
                    return Err(SessionError::Shutdown);
                }
                line = self.connection.read_line() => line,
            };

            let event = match line {
                Ok(line) => {
                    let command = Command::try_from(line).unwrap_or_else(|e| e);
                    self.dispatch(command, store.as_ref(), authenticator.as_ref())
                        .await
                }
                Err(err) => Err(err),
            };

            match event {
                Ok(Event::ConnectionKeepAlive) => {}
                Ok(Event::ConnectionClose) => return Ok(()),
                Err(ConnectionError::Closed) => {
                    internal!("Peer closed the connection");
                    return Ok(());
                }
                Err(err) => {
                    internal!(level = WARN, "Transport failure: {err}");
                    return Err(err.into());
                }
            }
        }
    }

    /// Write a reply as one unit
    pub(super) async fn reply(&mut self, reply: &Reply) -> ConnectionResult<()> {
        let lines = reply.lines();
        for line in &lines {
            outgoing!("{line}");
        }

        self.connection.send(&lines).await?;
        Ok(())
    }
}
