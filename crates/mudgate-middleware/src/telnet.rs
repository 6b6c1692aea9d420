//! [`TelnetTransport`] – MUD connection over plain TCP.
//!
//! MUD servers speak a minimal subset of telnet.  This transport refuses every
//! option the server offers or requests (`DO x` → `WONT x`, `WILL x` →
//! `DONT x`), drops subnegotiation blocks, and hands only the text payload to
//! the session.  Outbound commands are paced with a [`governor`] rate limiter
//! so the agent cannot flood the server faster than a human could type.
//!
//! Protocol handling lives in [`TelnetDecoder`], which is pure and keeps its
//! state across chunk boundaries; the transport only does I/O.

use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use mudgate_types::MudError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, trace};

use crate::transport::{MudTransport, ReadOutcome};

/// Default minimum spacing between two outbound commands.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(500);

const READ_BUFFER: usize = 4096;

// Telnet command bytes (RFC 854).
const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

// ─────────────────────────────────────────────────────────────────────────────
// Decoder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecodeState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// One decoded chunk: the text payload plus any negotiation replies that must
/// be written back to the server.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub replies: Vec<u8>,
}

/// Incremental telnet stream decoder.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: DecodeState,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    utf8_tail: Vec<u8>,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `bytes` and return the text they carried.
    pub fn feed(&mut self, bytes: &[u8]) -> Decoded {
        let mut data = std::mem::take(&mut self.utf8_tail);
        let mut replies = Vec::new();

        for &byte in bytes {
            self.state = match (self.state, byte) {
                (DecodeState::Data, IAC) => DecodeState::Iac,
                (DecodeState::Data, b) => {
                    data.push(b);
                    DecodeState::Data
                }
                (DecodeState::Iac, IAC) => {
                    data.push(IAC);
                    DecodeState::Data
                }
                (DecodeState::Iac, SB) => DecodeState::Sub,
                (DecodeState::Iac, cmd @ (DO | DONT | WILL | WONT)) => DecodeState::Negotiate(cmd),
                // GA, NOP, and friends carry no payload.
                (DecodeState::Iac, _) => DecodeState::Data,
                (DecodeState::Negotiate(cmd), option) => {
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    trace!(cmd, option, "telnet option refused");
                    DecodeState::Data
                }
                (DecodeState::Sub, IAC) => DecodeState::SubIac,
                (DecodeState::Sub, _) => DecodeState::Sub,
                (DecodeState::SubIac, SE) => DecodeState::Data,
                (DecodeState::SubIac, _) => DecodeState::Sub,
            };
        }

        let text = match std::str::from_utf8(&data) {
            Ok(text) => text.to_string(),
            Err(e) if e.error_len().is_none() => {
                self.utf8_tail = data.split_off(e.valid_up_to());
                String::from_utf8_lossy(&data).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&data).into_owned(),
        };

        Decoded { text, replies }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Telnet connection to a MUD server.
pub struct TelnetTransport {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    decoder: TelnetDecoder,
    pacer: Option<DefaultDirectRateLimiter>,
    buffer: Vec<u8>,
}

impl TelnetTransport {
    /// Open a TCP connection to `host:port`.
    ///
    /// A zero `send_interval` disables outbound pacing.
    ///
    /// # Errors
    ///
    /// [`MudError::Transport`] when the connection cannot be established.
    pub async fn connect(host: &str, port: u16, send_interval: Duration) -> Result<Self, MudError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| MudError::Transport(format!("connect to {host}:{port} failed: {e}")))?;
        info!(host, port, "connected to MUD server");
        Ok(Self::from_stream(stream, send_interval))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, send_interval: Duration) -> Self {
        let (reader, writer) = stream.into_split();
        let pacer = Quota::with_period(send_interval).map(RateLimiter::direct);
        Self {
            reader,
            writer,
            decoder: TelnetDecoder::new(),
            pacer,
            buffer: vec![0; READ_BUFFER],
        }
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), MudError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| MudError::Transport(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| MudError::Transport(format!("flush failed: {e}")))
    }
}

#[async_trait]
impl MudTransport for TelnetTransport {
    async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadOutcome, MudError> {
        let read = tokio::time::timeout(timeout, self.reader.read(&mut self.buffer)).await;
        let n = match read {
            Err(_) => return Ok(ReadOutcome::Timeout),
            Ok(Err(e)) => return Err(MudError::Transport(format!("read failed: {e}"))),
            Ok(Ok(0)) => {
                info!("server closed the connection");
                return Ok(ReadOutcome::Eof);
            }
            Ok(Ok(n)) => n,
        };

        let decoded = self.decoder.feed(&self.buffer[..n]);
        if !decoded.replies.is_empty() {
            debug!(bytes = decoded.replies.len(), "sending telnet refusals");
            self.write_raw(&decoded.replies).await?;
        }
        Ok(ReadOutcome::Data(decoded.text))
    }

    async fn send_line(&mut self, line: &str) -> Result<(), MudError> {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
        debug!(command = line, "sending line");
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write_raw(&bytes).await
    }

    async fn close(&mut self) -> Result<(), MudError> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| MudError::Transport(format!("shutdown failed: {e}")))
    }
}
