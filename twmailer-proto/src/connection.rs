use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::error::{ConnectionError, ConnectionResult};

/// Default upper bound on a single protocol line, terminator excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Newline-framed text over a byte stream
///
/// Lines are delimited by `\n` alone, whatever the size or timing of the
/// underlying reads, so a peer may send a command and its arguments in one
/// write or in many. A `\r` right before the `\n` is dropped as well.
/// Bytes that are not UTF-8 are replaced with U+FFFD rather than rejected,
/// so only UTF-8 text survives a SEND and READ unchanged.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    stream: BufReader<Stream>,
    max_line_length: usize,
    read_timeout: Duration,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Connection<Stream> {
    pub fn new(stream: Stream, max_line_length: usize, read_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            max_line_length,
            read_timeout,
        }
    }

    /// Read the next line, terminator stripped
    ///
    /// # Errors
    /// - [`ConnectionError::Closed`] if the peer closed the stream before
    ///   completing a line
    /// - [`ConnectionError::LineTooLong`] if the line exceeds the limit
    /// - [`ConnectionError::Timeout`] if no complete line arrived in time
    /// - [`ConnectionError::Io`] on any other transport failure
    pub async fn read_line(&mut self) -> ConnectionResult<String> {
        let limit = self.max_line_length;
        // Room for the line and a "\r\n" terminator.
        let budget = u64::try_from(limit.saturating_add(2)).unwrap_or(u64::MAX);
        let mut buffer = Vec::new();

        let read = tokio::time::timeout(
            self.read_timeout,
            (&mut self.stream).take(budget).read_until(b'\n', &mut buffer),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(self.read_timeout.as_secs()))??;

        if read == 0 {
            return Err(ConnectionError::Closed);
        }

        if buffer.last() != Some(&b'\n') {
            return Err(if buffer.len() >= limit.saturating_add(2) {
                ConnectionError::LineTooLong { limit }
            } else {
                ConnectionError::Closed
            });
        }

        buffer.pop();
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }

        if buffer.len() > limit {
            return Err(ConnectionError::LineTooLong { limit });
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write `lines` as one unit, each followed by `\n`
    ///
    /// # Errors
    /// If the stream cannot be written or flushed
    pub async fn send<I, S>(&mut self, lines: I) -> ConnectionResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let buffer = lines.into_iter().fold(String::new(), |mut buffer, line| {
            buffer.push_str(line.as_ref());
            buffer.push('\n');
            buffer
        });

        let stream = self.stream.get_mut();
        stream.write_all(buffer.as_bytes()).await?;
        stream.flush().await?;

        Ok(buffer.len())
    }

    /// Write a single line
    ///
    /// # Errors
    /// If the stream cannot be written or flushed
    pub async fn write_line(&mut self, line: &str) -> ConnectionResult<usize> {
        self.send([line]).await
    }

    /// Flush and shut down the write half
    ///
    /// # Errors
    /// If the stream cannot be shut down
    pub async fn shutdown(&mut self) -> ConnectionResult<()> {
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }
}
