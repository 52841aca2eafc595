use std::{net::SocketAddr, sync::Arc};

use futures_util::future::join_all;
use serde::Deserialize;
use tokio::{
    net::TcpListener,
    sync::{Semaphore, broadcast},
};
use tracing::Instrument;

use crate::{
    Signal,
    error::{ListenerError, ProtocolError},
    internal,
    traits::protocol::{Protocol, SessionHandler},
};

const fn default_max_sessions() -> usize {
    16
}

/// Accepts connections on one socket and drives a session per connection.
///
/// At most `max_sessions` sessions are in service at once; further peers
/// wait in the kernel backlog until a slot frees up. A limit of `1` serves
/// peers strictly one after the other.
#[derive(Debug, Deserialize)]
pub struct Listener<Proto: Protocol> {
    #[serde(skip)]
    handler: Proto,
    socket: SocketAddr,
    #[serde(default = "default_max_sessions")]
    max_sessions: usize,
    #[serde(default, alias = "args")]
    options: Proto::Args,
}

/// Resolves once a shutdown has been requested, or nobody is left to request one.
pub async fn shutdown_requested(shutdown: &mut broadcast::Receiver<Signal>) {
    loop {
        match shutdown.recv().await {
            Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed) => return,
            Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
}

impl<Proto: Protocol> Listener<Proto> {
    #[must_use]
    pub fn new(socket: SocketAddr, options: Proto::Args) -> Self {
        Self {
            handler: Proto::default(),
            socket,
            max_sessions: default_max_sessions(),
            options,
        }
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    #[must_use]
    pub const fn socket(&self) -> SocketAddr {
        self.socket
    }

    pub fn set_port(&mut self, port: u16) {
        self.socket.set_port(port);
    }

    #[must_use]
    pub const fn options(&self) -> &Proto::Args {
        &self.options
    }

    /// Replace the listener's protocol arguments, e.g. to inject runtime
    /// dependencies that cannot come from a config file.
    pub fn map_args<F>(&mut self, f: F)
    where
        F: FnOnce(Proto::Args) -> Proto::Args,
    {
        self.options = f(std::mem::take(&mut self.options));
    }

    /// Validate this listener before it starts serving
    ///
    /// # Errors
    /// If the session limit is zero, or the protocol rejects its arguments
    #[tracing::instrument(level = "trace", skip(self), fields(socket = %self.socket))]
    pub fn init(&mut self) -> Result<(), ProtocolError> {
        if self.max_sessions == 0 {
            return Err(ProtocolError::InvalidConfiguration {
                field: "max_sessions".to_string(),
                reason: "must allow at least one session".to_string(),
            });
        }

        self.handler.validate(&mut self.options)
    }

    /// Bind the configured socket
    ///
    /// # Errors
    /// If the address cannot be bound
    pub async fn bind(&self) -> Result<TcpListener, ListenerError> {
        TcpListener::bind(self.socket)
            .await
            .map_err(|source| ListenerError::BindFailed {
                address: self.socket.to_string(),
                source,
            })
    }

    /// Bind the configured socket and serve it until shutdown
    ///
    /// # Errors
    /// If the socket cannot be bound
    pub async fn serve(&self, shutdown: broadcast::Receiver<Signal>) -> Result<(), ListenerError> {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve an already bound socket until shutdown, then wait for every
    /// session still in service to finish.
    ///
    /// # Errors
    /// If the session limiter is closed
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), ListenerError> {
        let local = listener.local_addr().unwrap_or(self.socket);
        internal!(
            level = INFO,
            "{} listening on {local} (max {} sessions)",
            Proto::ty(),
            self.max_sessions
        );

        let limiter = Arc::new(Semaphore::new(self.max_sessions));
        let mut sessions = Vec::default();

        loop {
            let permit = tokio::select! {
                () = shutdown_requested(&mut shutdown) => break,
                permit = Arc::clone(&limiter).acquire_owned() => {
                    permit.map_err(|_| ListenerError::LimiterClosed)?
                }
            };

            let (stream, peer) = tokio::select! {
                () = shutdown_requested(&mut shutdown) => break,
                connection = listener.accept() => match connection {
                    Ok(connection) => connection,
                    Err(err) => {
                        internal!(level = WARN, "Failed to accept connection: {err}");
                        continue;
                    }
                },
            };

            internal!(level = INFO, "Connection from {peer}");

            sessions.retain(|session: &tokio::task::JoinHandle<()>| !session.is_finished());

            let session = self.handler.handle(stream, peer, self.options.clone());
            let signal = shutdown.resubscribe();
            let span = tracing::info_span!("session", %peer);

            sessions.push(tokio::spawn(
                async move {
                    let _permit = permit;

                    match session.run(signal).await {
                        Ok(()) => internal!(level = INFO, "Connection with {peer} ended"),
                        Err(err) if err.is_shutdown() => {
                            internal!(level = INFO, "Connection with {peer} ended: {err}");
                        }
                        Err(err) if err.is_client_error() => {
                            internal!(level = WARN, "Connection with {peer} ended: {err}");
                        }
                        Err(err) => {
                            internal!(level = ERROR, "Connection with {peer} failed: {err}");
                        }
                    }
                }
                .instrument(span),
            ));
        }

        internal!(
            level = INFO,
            "{} listener {local} received shutdown signal, finishing sessions ...",
            Proto::ty()
        );
        join_all(sessions).await;

        Ok(())
    }
}

impl<Proto: Protocol> From<SocketAddr> for Listener<Proto> {
    fn from(socket: SocketAddr) -> Self {
        Self::new(socket, Proto::Args::default())
    }
}
