use futures_util::future::join_all;
use serde::Deserialize;
use tokio::sync::broadcast::Receiver;

use crate::{Signal, error::ProtocolError, internal, listener::Listener, traits::Protocol};

/// Owns every listener of one protocol.
#[derive(Default, Deserialize)]
pub struct Controller<Proto: Protocol> {
    #[serde(alias = "listener")]
    listeners: Vec<Listener<Proto>>,
}

impl<Proto: Protocol> Controller<Proto> {
    #[must_use]
    pub const fn new(listeners: Vec<Listener<Proto>>) -> Self {
        Self { listeners }
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener<Proto>] {
        &self.listeners
    }

    /// Map over the args of all listeners, allowing modification before initialization
    ///
    /// This is useful for injecting dependencies that cannot be deserialized from a
    /// config file, such as the shared mailbox store or the authenticator.
    pub fn map_args<F>(&mut self, f: F)
    where
        F: Fn(Proto::Args) -> Proto::Args,
    {
        for listener in &mut self.listeners {
            listener.map_args(&f);
        }
    }

    ///
    /// Initialise this controller
    ///
    /// # Errors
    /// If there are no listeners, or any listener fails validation
    ///
    pub fn init(&mut self) -> Result<(), ProtocolError> {
        internal!("Initialising Controller for {}", Proto::ty());

        if self.listeners.is_empty() {
            return Err(ProtocolError::MissingField("listeners"));
        }

        self.listeners.iter_mut().try_for_each(Listener::init)
    }

    ///
    /// # Errors
    /// If any of the listeners have a failure
    ///
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn control(self, signal: Receiver<Signal>) -> anyhow::Result<()> {
        join_all(
            self.listeners
                .iter()
                .map(|l| l.serve(signal.resubscribe())),
        )
        .await
        .into_iter()
        .try_for_each(|result| result.map_err(anyhow::Error::from))
    }
}
