use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpStream, ToSocketAddrs},
};
use twmailer_common::{Identity, config::ClientTimeouts, incoming, outgoing};
use twmailer_spool::{MessageNumber, Subject};

use crate::{
    command::{Command, END_OF_BODY},
    connection::{Connection, DEFAULT_MAX_LINE_LENGTH},
    error::{ClientError, ConnectionError},
};

type Result<T> = std::result::Result<T, ClientError>;

/// A client session with a twmailer server
///
/// Every method sends one complete request and reads its complete reply,
/// so the connection is always positioned at a command boundary.
pub struct Client<Stream: AsyncRead + AsyncWrite + Unpin + Send = TcpStream> {
    connection: Connection<Stream>,
    greeting: String,
}

impl Client<TcpStream> {
    /// Connect to `address` and read the server greeting
    ///
    /// # Errors
    /// If the connection cannot be established in time or the greeting
    /// does not arrive
    pub async fn connect<A>(address: A, timeouts: ClientTimeouts) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Display + Send,
    {
        let stream =
            tokio::time::timeout(timeouts.connect_timeout(), TcpStream::connect(&address))
                .await
                .map_err(|_| ClientError::ConnectTimeout {
                    address: address.to_string(),
                    secs: timeouts.connect_secs,
                })?
                .map_err(ConnectionError::from)?;

        Self::from_stream(stream, &timeouts).await
    }
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Client<Stream> {
    /// Use an already connected stream and read the server greeting
    ///
    /// # Errors
    /// If the greeting does not arrive
    pub async fn from_stream(stream: Stream, timeouts: &ClientTimeouts) -> Result<Self> {
        let mut connection = Connection::new(
            stream,
            DEFAULT_MAX_LINE_LENGTH,
            timeouts.response_timeout(),
        );
        let greeting = connection.read_line().await?;
        incoming!("{greeting}");

        Ok(Self {
            connection,
            greeting,
        })
    }

    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    async fn request(&mut self, lines: &[&str]) -> Result<()> {
        if let Some(keyword) = lines.first() {
            outgoing!("{keyword}");
        }

        self.connection.send(lines).await?;
        Ok(())
    }

    async fn reply_line(&mut self) -> Result<String> {
        let line = self.connection.read_line().await?;
        incoming!("{line}");
        Ok(line)
    }

    async fn status(&mut self) -> Result<bool> {
        let line = self.reply_line().await?;
        match line.as_str() {
            "OK" => Ok(true),
            "ERR" => Ok(false),
            _ => Err(ClientError::UnexpectedReply(line)),
        }
    }

    /// Authenticate; `false` if the server refused
    ///
    /// # Errors
    /// On transport failure or an unexpected reply
    pub async fn login(&mut self, identity: &Identity, secret: &str) -> Result<bool> {
        let login = Command::Login.to_string();
        self.request(&[login.as_str(), identity.as_str(), secret])
            .await?;
        self.status().await
    }

    /// Send a message; `false` if the server refused
    ///
    /// # Errors
    /// If a body line is a lone `.`, on transport failure, or on an
    /// unexpected reply
    pub async fn send(
        &mut self,
        receiver: &Identity,
        subject: &Subject,
        body: &[String],
    ) -> Result<bool> {
        if body.iter().any(|line| line == END_OF_BODY) {
            return Err(ClientError::InvalidBody);
        }

        let send = Command::Send.to_string();
        let lines: Vec<&str> = [send.as_str(), receiver.as_str(), subject.as_str()]
            .into_iter()
            .chain(body.iter().map(String::as_str))
            .chain([END_OF_BODY])
            .collect();

        self.request(&lines).await?;
        self.status().await
    }

    /// Subjects in the caller's mailbox; `None` if the server refused
    ///
    /// # Errors
    /// On transport failure or an unexpected reply
    pub async fn list(&mut self) -> Result<Option<Vec<String>>> {
        let list = Command::List.to_string();
        self.request(&[list.as_str()]).await?;

        let count = self.reply_line().await?;
        if count == "ERR" {
            return Ok(None);
        }

        let count: usize = count
            .parse()
            .map_err(|_| ClientError::UnexpectedReply(count.clone()))?;

        let mut subjects = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            subjects.push(self.reply_line().await?);
        }

        Ok(Some(subjects))
    }

    /// Body of one message; `None` if the server refused
    ///
    /// # Errors
    /// On transport failure or an unexpected reply
    pub async fn read(&mut self, number: MessageNumber) -> Result<Option<Vec<String>>> {
        let read = Command::Read.to_string();
        self.request(&[read.as_str(), &number.to_string()]).await?;

        if !self.status().await? {
            return Ok(None);
        }

        let mut body = Vec::new();
        loop {
            let line = self.reply_line().await?;
            if line == END_OF_BODY {
                return Ok(Some(body));
            }
            body.push(line);
        }
    }

    /// Delete one message; `false` if the server refused
    ///
    /// # Errors
    /// On transport failure or an unexpected reply
    pub async fn delete(&mut self, number: MessageNumber) -> Result<bool> {
        let del = Command::Del.to_string();
        self.request(&[del.as_str(), &number.to_string()]).await?;
        self.status().await
    }

    /// End the session
    ///
    /// # Errors
    /// If the request cannot be written
    pub async fn quit(mut self) -> Result<()> {
        let quit = Command::Quit.to_string();
        self.request(&[quit.as_str()]).await?;
        self.connection.shutdown().await?;
        Ok(())
    }
}
