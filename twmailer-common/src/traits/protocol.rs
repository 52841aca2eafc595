use std::{fmt::Debug, net::SocketAddr};

use serde::Deserialize;
use tokio::net::TcpStream;

use crate::{
    Signal,
    error::{ProtocolError, SessionError},
};

/// One accepted connection, ready to be driven to completion.
pub trait SessionHandler {
    fn run(
        self,
        signal: tokio::sync::broadcast::Receiver<Signal>,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

pub trait Protocol: Default + Send + Sync {
    type Session: SessionHandler + Send + 'static;
    type Args: Default + Clone + Debug + Send + Sync + for<'a> Deserialize<'a>;

    /// Build a fresh session for a newly accepted stream.
    ///
    /// Nothing is shared between the sessions this returns apart from what
    /// `args` hands out (e.g. the mailbox store).
    fn handle(&self, stream: TcpStream, peer: SocketAddr, args: Self::Args) -> Self::Session;

    ///
    /// Validate the arguments being provided to the protocol
    ///
    /// # Errors
    /// When a required runtime dependency is missing, or a configured value
    /// cannot work (for example a line limit too small to carry a subject).
    ///
    fn validate(&self, args: &mut Self::Args) -> Result<(), ProtocolError>;

    fn ty() -> &'static str;
}
