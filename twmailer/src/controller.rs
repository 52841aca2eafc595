use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::LazyLock,
};

use serde::Deserialize;
use tokio::sync::broadcast;
use twmailer_common::{
    Signal,
    controller::Controller,
    internal,
    listener::Listener,
    logging::{self, LogConfig},
};
use twmailer_proto::{Mailer, MailerArgs, auth::AuthConfig};
use twmailer_spool::SpoolConfig;

/// Port the built-in default listener binds.
pub const DEFAULT_PORT: u16 = 6543;

/// Everything one server process runs: its listeners, the spool they share
/// and where LOGIN credentials come from.
#[derive(Debug, Default, Deserialize)]
pub struct Twmailer {
    #[serde(alias = "listener")]
    listeners: Vec<Listener<Mailer>>,
    #[serde(default)]
    spool: SpoolConfig,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    logging: LogConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

#[tracing::instrument(level = "trace")]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    // Sessions still in service hold the listeners open; a second CTRL+C
    // abandons them.
    tokio::signal::ctrl_c().await?;
    internal!(level = WARN, "Forcing shutdown");

    Ok(())
}

impl Twmailer {
    /// A single listener on every interface at [`DEFAULT_PORT`], the default
    /// spool, and no users.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            listeners: vec![Listener::new(
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
                MailerArgs::default(),
            )],
            spool: SpoolConfig::default(),
            auth: AuthConfig::default(),
            logging: LogConfig::default(),
        }
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener<Mailer>] {
        &self.listeners
    }

    #[must_use]
    pub const fn spool(&self) -> &SpoolConfig {
        &self.spool
    }

    #[must_use]
    pub const fn logging(&self) -> &LogConfig {
        &self.logging
    }

    /// Serve every listener on `port` instead of its configured one.
    pub fn set_port(&mut self, port: u16) {
        for listener in &mut self.listeners {
            listener.set_port(port);
        }
    }

    /// Keep mail in a file spool rooted at `path`.
    pub fn set_spool_dir(&mut self, path: PathBuf) {
        self.spool = SpoolConfig::File { path };
    }

    /// Open the spool, build the authenticator, hand both to every listener
    /// and validate the result.
    ///
    /// # Errors
    /// If the spool cannot be opened, there are no listeners, or a listener
    /// rejects its configuration
    pub fn prepare(self) -> anyhow::Result<Controller<Mailer>> {
        if let AuthConfig::Static { users } = &self.auth
            && users.is_empty()
        {
            internal!(
                level = WARN,
                "No users are configured, every LOGIN will be rejected"
            );
        }

        let store = self.spool.into_store()?;
        let authenticator = self.auth.into_authenticator();

        let mut controller = Controller::new(self.listeners);
        controller.map_args(|args| {
            args.with_store(store.clone())
                .with_authenticator(authenticator.clone())
        });
        controller.init()?;

        Ok(controller)
    }

    /// Run this server until it is told to shut down
    ///
    /// # Errors
    ///
    /// This function will return an error if the spool cannot be opened, the
    /// configuration is rejected, or a listener cannot bind its socket.
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init(&self.logging);

        internal!("Controller running");

        let controller = self.prepare()?;

        let ret = tokio::select! {
            r = controller.control(SHUTDOWN_BROADCAST.subscribe()) => {
                r
            }
            r = shutdown() => {
                r
            }
        };

        internal!(level = INFO, "Shutting down...");

        ret
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let twmailer = Twmailer::with_defaults();
        assert_eq!(twmailer.listeners().len(), 1);
        assert_eq!(twmailer.listeners()[0].socket().port(), DEFAULT_PORT);
        assert_eq!(
            twmailer.spool().path(),
            Some(std::path::Path::new("/var/spool/twmailer"))
        );
    }

    #[test]
    fn test_overrides() {
        let mut twmailer = Twmailer::with_defaults();
        twmailer.set_port(7000);
        twmailer.set_spool_dir(PathBuf::from("/srv/mail"));

        assert_eq!(twmailer.listeners()[0].socket().port(), 7000);
        assert_eq!(
            twmailer.spool().path(),
            Some(std::path::Path::new("/srv/mail"))
        );
    }

    #[test]
    fn test_prepare_requires_listeners() {
        let twmailer = Twmailer {
            spool: SpoolConfig::Memory { capacity: None },
            ..Twmailer::default()
        };

        assert!(twmailer.prepare().is_err());
    }

    #[test]
    fn test_prepare_rejects_relative_spool() {
        let mut twmailer = Twmailer::with_defaults();
        twmailer.set_spool_dir(PathBuf::from("relative/spool"));

        assert!(twmailer.prepare().is_err());
    }

    #[test]
    fn test_prepare_opens_spool() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("spool");

        let mut twmailer = Twmailer::with_defaults();
        twmailer.set_spool_dir(root.clone());

        let controller = twmailer.prepare().unwrap();
        assert_eq!(controller.listeners().len(), 1);
        assert!(root.is_dir());
    }
}
