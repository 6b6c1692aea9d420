//! The transport seam.
//!
//! The session never talks to a socket directly.  It reads and writes through
//! a [`MudTransport`], so the real telnet connection and scripted test doubles
//! are interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use mudgate_types::MudError;

/// Result of one bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Decoded server text. May be empty when a chunk carried only protocol
    /// negotiation.
    Data(String),
    /// Nothing arrived before the timeout elapsed.
    Timeout,
    /// The server closed the connection.
    Eof,
}

/// Full-duplex, line-oriented text channel to a MUD server.
///
/// # Contract
///
/// * `read_chunk` – waits at most `timeout` for the next burst of text.
///   Chunk boundaries are arbitrary; callers must not assume whole lines.
/// * `send_line` – writes `line` followed by `\n` and flushes.  Implementations
///   may delay the write to respect the server's pacing.
///
/// Any `Err` is a [`MudError::Transport`] and ends the session.
#[async_trait]
pub trait MudTransport: Send {
    async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadOutcome, MudError>;

    async fn send_line(&mut self, line: &str) -> Result<(), MudError>;

    /// Shut the connection down. The default does nothing.
    async fn close(&mut self) -> Result<(), MudError> {
        Ok(())
    }
}
