use tokio::io::{AsyncRead, AsyncWrite};
use twmailer_common::{incoming, tracing};

use super::Session;
use crate::{
    command::{Body, Command, END_OF_BODY, Request},
    error::ConnectionResult,
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    /// Read the argument lines that belong to `command`
    ///
    /// The whole frame is always read, whether or not the command will be
    /// accepted, so the next line is guaranteed to be a command keyword.
    #[tracing::instrument(level = "trace", skip(self))]
    pub(super) async fn read_request(&mut self, command: Command) -> ConnectionResult<Request> {
        incoming!("{command}");

        Ok(match command {
            Command::Login => Request::Login {
                identity: self.read_argument().await?,
                secret: self.read_secret().await?,
            },
            Command::Send => Request::Send {
                receiver: self.read_argument().await?,
                subject: self.read_argument().await?,
                body: self.read_body().await?,
            },
            Command::List => Request::List,
            Command::Read => Request::Read {
                number: self.read_argument().await?,
            },
            Command::Del => Request::Del {
                number: self.read_argument().await?,
            },
            Command::Quit => Request::Quit,
            Command::Invalid(line) => Request::Invalid(line),
        })
    }

    async fn read_argument(&mut self) -> ConnectionResult<String> {
        let line = self.connection.read_line().await?;
        incoming!("{line}");
        Ok(line)
    }

    async fn read_secret(&mut self) -> ConnectionResult<String> {
        let line = self.connection.read_line().await?;
        incoming!("<secret redacted>");
        Ok(line)
    }

    /// Body lines up to, not including, the terminating `.`
    async fn read_body(&mut self) -> ConnectionResult<Body> {
        let mut body = Body::with_limit(self.max_message_size);

        loop {
            let line = self.connection.read_line().await?;
            if line == END_OF_BODY {
                break;
            }

            incoming!(level = TRACE, "{line}");
            body.push(line);
        }

        Ok(body)
    }
}
