//! Twitch IRC session: connect, authenticate, join, read framed lines, answer PINGs.
//!
//! The session owns exactly one stream and walks a small state machine:
//!
//! ```text
//! Disconnected → Connecting → Joined → Listening → Closed
//! ```
//!
//! `Connecting → Joined` is all-or-nothing: either PASS, NICK and JOIN were all written
//! or [`ChatSession::handshake`] returns an error and no session exists. There is no
//! reconnection here. When the peer hangs up the session drops back to `Disconnected`
//! and only [`ChatSession::close`] remains useful.
//!
//! [`ChatSession`] is generic over the stream so tests can drive it with in-memory I/O.

pub mod framer;

use std::io;

use log::{debug, info};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::TwitchConfig;
use crate::logutil::redact_outbound;
use framer::LineFramer;

/// Bytes requested per socket read.
pub const READ_CHUNK_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Joined,
    Listening,
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send {command}: {source}")]
    Send {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read from chat server: {0}")]
    Read(#[source] io::Error),

    #[error("connection closed by chat server")]
    Closed,

    #[error("session is not listening (state {0:?})")]
    NotConnected(SessionState),
}

impl SessionError {
    /// True when retrying the read cannot succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::Closed | SessionError::NotConnected(_))
    }
}

/// Login material for the PASS/NICK lines.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl From<&TwitchConfig> for Credentials {
    fn from(config: &TwitchConfig) -> Self {
        Self {
            username: config.username.clone(),
            token: config.token.clone(),
        }
    }
}

pub struct ChatSession<S> {
    stream: S,
    framer: LineFramer,
    state: SessionState,
    read_buf: Vec<u8>,
}

impl ChatSession<TcpStream> {
    /// Open a TCP connection to the configured server and perform the handshake.
    pub async fn connect(config: &TwitchConfig) -> Result<Self, SessionError> {
        let addr = format!("{}:{}", config.server, config.port);
        debug!(
            "connecting to {} as {} for #{}",
            addr, config.username, config.channel
        );
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| SessionError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let session = Self::handshake(stream, &Credentials::from(config), &config.channel).await?;
        info!("joined #{} on {}", config.channel, addr);
        Ok(session)
    }
}

impl<S> ChatSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send PASS, NICK and JOIN over an already-open stream, in that order.
    pub async fn handshake(
        stream: S,
        credentials: &Credentials,
        channel: &str,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            stream,
            framer: LineFramer::new(),
            state: SessionState::Disconnected,
            read_buf: vec![0u8; READ_CHUNK_SIZE],
        };
        session.state = SessionState::Connecting;
        let channel = channel.trim_start_matches('#');
        session
            .send_line(&format!("PASS {}", credentials.token))
            .await?;
        session
            .send_line(&format!("NICK {}", credentials.username))
            .await?;
        session.send_line(&format!("JOIN #{}", channel)).await?;
        session.state = SessionState::Joined;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let command = line.split(' ').next().unwrap_or_default().to_string();
        let mut wire = String::with_capacity(line.len() + 2);
        wire.push_str(line);
        wire.push_str("\r\n");
        self.stream
            .write_all(wire.as_bytes())
            .await
            .map_err(|source| SessionError::Send {
                command: command.clone(),
                source,
            })?;
        self.stream
            .flush()
            .await
            .map_err(|source| SessionError::Send { command, source })?;
        debug!("sent: {}", redact_outbound(line));
        Ok(())
    }

    /// Perform one read and return every line it completed, in wire order. The result
    /// may be empty when the read ended mid-line; the remainder is kept for the next call.
    pub async fn read_lines(&mut self) -> Result<Vec<String>, SessionError> {
        match self.state {
            SessionState::Joined | SessionState::Listening => {}
            other => return Err(SessionError::NotConnected(other)),
        }
        self.state = SessionState::Listening;
        let n = self
            .stream
            .read(&mut self.read_buf)
            .await
            .map_err(SessionError::Read)?;
        if n == 0 {
            self.state = SessionState::Disconnected;
            return Err(SessionError::Closed);
        }
        self.framer.push(&self.read_buf[..n]);
        Ok(self.framer.drain_lines())
    }

    /// Answer a PING with the same token it carried.
    pub async fn respond_to_keepalive(&mut self, token: &str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Joined | SessionState::Listening => {}
            other => return Err(SessionError::NotConnected(other)),
        }
        self.send_line(&format!("PONG {}", token)).await
    }

    /// Release the stream. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.stream.shutdown().await {
            debug!("error while shutting down chat stream: {}", e);
        }
        self.framer.clear();
        self.state = SessionState::Closed;
        info!("chat session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn creds() -> Credentials {
        Credentials {
            username: "printbot".to_string(),
            token: "oauth:abc".to_string(),
        }
    }

    #[tokio::test]
    async fn handshake_sends_pass_nick_join_in_order() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write(b"NICK printbot\r\n")
            .write(b"JOIN #chan\r\n")
            .build();
        let session = ChatSession::handshake(mock, &creds(), "#chan")
            .await
            .expect("handshake");
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[tokio::test]
    async fn handshake_send_failure_is_reported() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let err = ChatSession::handshake(mock, &creds(), "chan")
            .await
            .err()
            .expect("handshake should fail");
        assert!(matches!(err, SessionError::Send { ref command, .. } if command == "NICK"));
    }

    #[tokio::test]
    async fn read_lines_reassembles_split_reads() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write(b"NICK printbot\r\n")
            .write(b"JOIN #chan\r\n")
            .read(b"PING :tmi.tw")
            .read(b"itch.tv\r\n:a!a@a.tmi.twitch.tv PRIVMSG #chan :hi\r\n")
            .build();
        let mut session = ChatSession::handshake(mock, &creds(), "chan").await.unwrap();
        assert!(session.read_lines().await.unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Listening);
        let lines = session.read_lines().await.unwrap();
        assert_eq!(
            lines,
            vec![
                "PING :tmi.twitch.tv".to_string(),
                ":a!a@a.tmi.twitch.tv PRIVMSG #chan :hi".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn eof_reports_closed_and_close_is_idempotent() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write(b"NICK printbot\r\n")
            .write(b"JOIN #chan\r\n")
            .build();
        let mut session = ChatSession::handshake(mock, &creds(), "chan").await.unwrap();
        let err = session.read_lines().await.unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(matches!(
            session.respond_to_keepalive(":x").await,
            Err(SessionError::NotConnected(SessionState::Disconnected))
        ));
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.read_lines().await,
            Err(SessionError::NotConnected(SessionState::Closed))
        ));
    }

    #[tokio::test]
    async fn read_error_is_not_terminal() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write(b"NICK printbot\r\n")
            .write(b"JOIN #chan\r\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .read(b"PING :x\r\n")
            .build();
        let mut session = ChatSession::handshake(mock, &creds(), "chan").await.unwrap();
        let err = session.read_lines().await.unwrap_err();
        assert!(!err.is_terminal());
        assert_eq!(session.read_lines().await.unwrap(), vec!["PING :x"]);
    }

    #[tokio::test]
    async fn pong_echoes_token() {
        let mock = Builder::new()
            .write(b"PASS oauth:abc\r\n")
            .write(b"NICK printbot\r\n")
            .write(b"JOIN #chan\r\n")
            .write(b"PONG :tmi.twitch.tv\r\n")
            .build();
        let mut session = ChatSession::handshake(mock, &creds(), "chan").await.unwrap();
        session.respond_to_keepalive(":tmi.twitch.tv").await.unwrap();
    }
}
