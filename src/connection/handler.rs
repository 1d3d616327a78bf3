//! Connection Handler
//!
//! One handler per connected client. Bytes accumulate in a `BytesMut`
//! buffer; every complete command in the buffer is executed in order and
//! the replies are flushed together, so pipelined requests are answered in
//! the order they arrived.
//!
//! ```text
//! read bytes ──> parse_message ──> Command::from_frame ──> execute ──> write reply
//!     ▲               │ incomplete                                       │
//!     └───────────────┴─────────────────── flush <────────────────────────┘
//! ```
//!
//! Protocol errors are answered with `-ERR Protocol error: ...` and the
//! connection stays open. A well-framed message that is not a command (for
//! example an array of integers) is skipped on its own, so commands
//! pipelined behind it still run. When no frame boundary can be found the
//! whole buffer is discarded.

use crate::commands::CommandHandler;
use crate::protocol::{parse_message, Command, ParseError, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Upper bound on buffered, not yet parsed bytes (64 MB)
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Handles a single client connection.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    buffer: BytesMut,

    command_handler: CommandHandler,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, addr: SocketAddr, command_handler: CommandHandler) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
        }
    }

    /// Serves the client until it disconnects or an I/O error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let mut replied = false;

            loop {
                match self.try_parse_command() {
                    Ok(Some(Ok(command))) => {
                        let response = self.command_handler.execute(command);
                        self.write_response(&response).await?;
                        replied = true;
                    }
                    Ok(Some(Err(e))) => {
                        debug!(client = %self.addr, error = %e, "Skipped malformed command");
                        self.write_protocol_error(&e).await?;
                        replied = true;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(client = %self.addr, error = %e, "Protocol error");
                        self.buffer.clear();
                        self.write_protocol_error(&e).await?;
                        replied = true;
                        break;
                    }
                }
            }

            if replied {
                self.stream.flush().await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Takes the next complete frame off the buffer.
    ///
    /// The outer error means the buffer cannot be framed at all. The inner
    /// error means one frame was consumed but is not a valid command.
    fn try_parse_command(&mut self) -> Result<Option<Result<Command, ParseError>>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match parse_message(&self.buffer)? {
            Some((frame, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                let command = Command::from_frame(frame);
                trace!(
                    client = %self.addr,
                    command = command.as_ref().map(|c| c.name()).unwrap_or("?"),
                    consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Ok(Some(command))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            return Err(ConnectionError::UnexpectedEof);
        }

        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(())
    }

    async fn write_protocol_error(&mut self, e: &ParseError) -> Result<(), ConnectionError> {
        let response = RespValue::error(format!("ERR Protocol error: {}", e));
        self.write_response(&response).await
    }

    async fn write_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        trace!(client = %self.addr, bytes = bytes.len(), "Queued response");
        Ok(())
    }
}

/// Errors that end a client connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client closed the connection between commands
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the connection mid-command
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Runs a [`ConnectionHandler`] for an accepted TCP stream to completion.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, command_handler: CommandHandler) {
    let handler = ConnectionHandler::new(stream, addr, command_handler);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => debug!(client = %addr, error = %e, "Connection ended with error"),
        }
    }
}
