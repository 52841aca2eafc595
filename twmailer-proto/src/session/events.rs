use tokio::io::{AsyncRead, AsyncWrite};
use twmailer_common::{Identity, internal, tracing};
use twmailer_spool::{MailboxStore, Message, MessageNumber, Subject};

use super::{Event, Reply, Session};
use crate::{
    State,
    auth::{AuthOutcome, Authenticator},
    command::{Body, Command, Request},
    error::{CommandError, ConnectionResult},
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    /// Read the rest of `command`'s frame, run it and reply
    ///
    /// Every failure that is not a transport failure becomes a single `ERR`
    /// reply and the session carries on. QUIT closes without a reply.
    ///
    /// # Errors
    /// Only transport failures, which end the connection
    pub(super) async fn dispatch(
        &mut self,
        command: Command,
        store: &dyn MailboxStore,
        authenticator: &dyn Authenticator,
    ) -> ConnectionResult<Event> {
        let gated = command.requires_auth();
        let request = self.read_request(command).await?;

        if matches!(request, Request::Quit) {
            internal!("Peer quit");
            return Ok(Event::ConnectionClose);
        }

        let result = if gated && !self.state.is_authenticated() {
            Err(CommandError::Unauthenticated)
        } else {
            self.execute(request, store, authenticator).await
        };

        let reply = result.unwrap_or_else(|err| {
            match &err {
                CommandError::Storage(cause) => {
                    internal!(level = ERROR, "Storage failure: {cause}");
                }
                err => internal!(level = DEBUG, "Command failed: {err}"),
            }
            Reply::Err
        });

        self.reply(&reply).await?;
        Ok(Event::ConnectionKeepAlive)
    }

    async fn execute(
        &mut self,
        request: Request,
        store: &dyn MailboxStore,
        authenticator: &dyn Authenticator,
    ) -> Result<Reply, CommandError> {
        match request {
            Request::Login { identity, secret } => {
                self.login(&identity, &secret, authenticator).await
            }
            Request::Send {
                receiver,
                subject,
                body,
            } => self.send(&receiver, &subject, body, store).await,
            Request::List => self.list(store).await,
            Request::Read { number } => self.read(&number, store).await,
            Request::Del { number } => self.delete(&number, store).await,
            Request::Invalid(line) => Err(CommandError::Unknown(line)),
            // Closed by `dispatch` before execution
            Request::Quit => Ok(Reply::Ok),
        }
    }

    fn identity(&self) -> Result<&Identity, CommandError> {
        self.state.identity().ok_or(CommandError::Unauthenticated)
    }

    #[tracing::instrument(level = "debug", skip(self, secret, authenticator))]
    async fn login(
        &mut self,
        identity: &str,
        secret: &str,
        authenticator: &dyn Authenticator,
    ) -> Result<Reply, CommandError> {
        if self.state.is_authenticated() {
            return Err(CommandError::AlreadyAuthenticated);
        }

        let identity = Identity::parse(identity)?;

        match authenticator.authenticate(&identity, secret).await {
            AuthOutcome::Authenticated => {
                internal!(level = INFO, "Authenticated as {identity}");
                self.state = State::Authenticated(identity);
                Ok(Reply::Ok)
            }
            AuthOutcome::Rejected => {
                internal!(level = INFO, "Rejected login for {identity}");
                Err(CommandError::Rejected)
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body, store))]
    async fn send(
        &self,
        receiver: &str,
        subject: &str,
        body: Body,
        store: &dyn MailboxStore,
    ) -> Result<Reply, CommandError> {
        let sender = self.identity()?.clone();
        let receiver = Identity::parse(receiver)?;
        let subject = Subject::parse(subject)?;

        if let Some(limit) = body.limit()
            && body.is_oversized()
        {
            return Err(CommandError::TooLarge {
                size: body.size(),
                limit,
            });
        }

        let message = Message::new(sender, receiver, subject, body.into_lines());
        let number = store.append(&message).await?;

        internal!(
            level = INFO,
            "Stored message {number} from {} for {}",
            message.sender,
            message.receiver
        );

        Ok(Reply::Ok)
    }

    async fn list(&self, store: &dyn MailboxStore) -> Result<Reply, CommandError> {
        let subjects = store.list_subjects(self.identity()?).await?;
        Ok(Reply::Listing(subjects))
    }

    async fn read(&self, number: &str, store: &dyn MailboxStore) -> Result<Reply, CommandError> {
        let number = MessageNumber::parse(number)?;
        let message = store.fetch(self.identity()?, number).await?;
        Ok(Reply::Message(message.body))
    }

    async fn delete(&self, number: &str, store: &dyn MailboxStore) -> Result<Reply, CommandError> {
        let number = MessageNumber::parse(number)?;
        store.delete(self.identity()?, number).await?;
        internal!(level = INFO, "Deleted message {number}");
        Ok(Reply::Ok)
    }
}
