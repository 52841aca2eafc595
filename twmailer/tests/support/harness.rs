//! End-to-end test harness for twmailer
//!
//! Starts a complete server from a configuration document, the same way the
//! `twmailer` binary does, but bound to a random port and with its spool in
//! a temporary directory.
//!
//! # Example
//!
//! ```no_run
//! use support::harness::TestServer;
//!
//! #[tokio::test]
//! async fn test_login() {
//!     let server = TestServer::builder().build().await.unwrap();
//!
//!     let mut client = server.client().await.unwrap();
//!     assert!(client.login(&"alice".try_into().unwrap(), "secret").await.unwrap());
//!
//!     server.shutdown().await.unwrap();
//! }
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tempfile::TempDir;
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle, time::timeout};
use twmailer_common::{Signal, config::ClientTimeouts, error::ListenerError};
use twmailer_proto::{auth::hash_secret, client::Client};

/// Users every test server knows, with their secrets.
pub const USERS: [(&str, &str); 3] = [
    ("alice", "secret"),
    ("bob", "hunter2"),
    ("12345678", "digits"),
];

/// A running server
pub struct TestServer {
    /// Port the server is listening on
    port: u16,

    /// Spool root
    spool_path: PathBuf,

    /// Keeps a spool this harness created alive
    _spool: Option<TempDir>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<Signal>,

    /// Handle for the listener task
    handle: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    /// Create a new builder for configuring the test server
    #[must_use]
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::new()
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn spool_path(&self) -> &Path {
        &self.spool_path
    }

    /// Connect a protocol client and read the greeting
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the greeting fails.
    pub async fn client(&self) -> anyhow::Result<Client> {
        let timeouts = ClientTimeouts {
            connect_secs: 5,
            response_secs: 5,
        };

        Ok(Client::connect(format!("127.0.0.1:{}", self.port), timeouts).await?)
    }

    /// Signal shutdown and wait for the listener to finish its sessions
    ///
    /// # Errors
    ///
    /// Returns an error if the listener failed or does not finish within
    /// five seconds.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(Signal::Shutdown);

        timeout(Duration::from_secs(5), self.handle).await???;
        Ok(())
    }
}

/// Builder for configuring a test server
pub struct TestServerBuilder {
    max_sessions: usize,
    max_message_size: usize,
    spool_path: Option<PathBuf>,
}

impl TestServerBuilder {
    const fn new() -> Self {
        Self {
            max_sessions: 16,
            max_message_size: 1024 * 1024,
            spool_path: None,
        }
    }

    /// Set how many sessions are served at once (default: 16)
    #[must_use]
    pub const fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Set the largest accepted body in bytes (default: 1 MiB)
    #[must_use]
    pub const fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Reuse an existing spool instead of a fresh temporary one
    #[must_use]
    pub fn with_spool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spool_path = Some(path.into());
        self
    }

    fn config(&self, spool_path: &Path) -> String {
        let users = USERS
            .iter()
            .map(|(name, secret)| format!("{name:?}: {:?},", hash_secret(secret)))
            .collect::<String>();

        format!(
            r#"Twmailer(
                listeners: [
                    (
                        socket: "127.0.0.1:0",
                        max_sessions: {},
                        options: (banner: "E2E", max_message_size: {}),
                    ),
                ],
                spool: File(path: {:?}),
                auth: Static(users: {{ {users} }}),
            )"#,
            self.max_sessions,
            self.max_message_size,
            spool_path.display().to_string(),
        )
    }

    /// Build and start the server
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected or the socket
    /// cannot be bound.
    pub async fn build(self) -> anyhow::Result<TestServer> {
        let (spool, spool_path) = match &self.spool_path {
            Some(path) => (None, path.clone()),
            None => {
                let dir = TempDir::new()?;
                let path = dir.path().join("spool");
                (Some(dir), path)
            }
        };

        let twmailer = twmailer::config::parse(&self.config(&spool_path))?;
        let controller = Arc::new(twmailer.prepare()?);

        let socket = TcpListener::bind("127.0.0.1:0").await?;
        let port = socket.local_addr()?.port();

        let (shutdown_tx, _) = broadcast::channel(16);
        let shutdown_rx = shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            match controller.listeners().first() {
                Some(listener) => listener.serve_on(socket, shutdown_rx).await,
                None => Ok(()),
            }
        });

        Ok(TestServer {
            port,
            spool_path,
            _spool: spool,
            shutdown_tx,
            handle,
        })
    }
}
