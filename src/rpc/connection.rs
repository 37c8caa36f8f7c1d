//! The single physical TCP stream shared by every call.
//!
//! The write half sits behind an async mutex so that two callers never
//! interleave bytes mid-line. The read half is handed out exactly once, to
//! the reader task, and needs no locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace};

use crate::rpc::codec::DELIMITER;
use crate::rpc::error::RpcError;

/// Lifecycle of the physical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Serving reads and writes.
    Connected,
    /// Peer hung up, a write failed, or the client shut down. No reconnect.
    Closed,
}

/// Shared open/closed flag for a connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionStatus {
    closed: Arc<AtomicBool>,
}

impl ConnectionStatus {
    pub(crate) fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Largest accepted inbound line, delimiter included.
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Result of one [`LineReader::read_line`].
#[derive(Debug, PartialEq, Eq)]
pub enum ReadLine {
    /// One line, including its delimiter if the peer sent one.
    Line(Vec<u8>),
    /// A line longer than [`MAX_LINE_SIZE`]. Its bytes were discarded up to
    /// and including the delimiter; carries the discarded length.
    Oversized(usize),
    /// Peer closed the stream or the read failed. Terminal.
    EndOfStream,
}

/// Exclusive reader over the inbound half of the stream.
pub struct LineReader {
    inner: BufReader<OwnedReadHalf>,
}

impl LineReader {
    /// Read one newline-terminated line.
    ///
    /// At most [`MAX_LINE_SIZE`] bytes are buffered. A longer line is skipped
    /// without being kept in memory and reported as [`ReadLine::Oversized`].
    /// A final unterminated line before EOF is still returned as a line; the
    /// following call yields [`ReadLine::EndOfStream`].
    pub async fn read_line(&mut self) -> ReadLine {
        let mut buf = Vec::new();
        let mut discarded = 0usize;

        loop {
            let available = match self.inner.fill_buf().await {
                Ok(available) => available,
                Err(e) => {
                    debug!("RPC read failed: {}", e);
                    return ReadLine::EndOfStream;
                }
            };

            // EOF
            if available.is_empty() {
                return if discarded > 0 {
                    ReadLine::Oversized(discarded)
                } else if buf.is_empty() {
                    ReadLine::EndOfStream
                } else {
                    trace!("RPC <- {}", String::from_utf8_lossy(&buf).trim_end());
                    ReadLine::Line(buf)
                };
            }

            let (used, complete) = match available.iter().position(|b| *b == DELIMITER) {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };

            if discarded == 0 && buf.len() + used <= MAX_LINE_SIZE {
                buf.extend_from_slice(&available[..used]);
            } else {
                discarded += buf.len() + used;
                buf.clear();
            }
            self.inner.consume(used);

            if complete {
                if discarded > 0 {
                    return ReadLine::Oversized(discarded);
                }
                trace!("RPC <- {}", String::from_utf8_lossy(&buf).trim_end());
                return ReadLine::Line(buf);
            }
        }
    }
}

/// A connected, shared TCP stream.
pub struct Connection {
    addr: String,
    writer: tokio::sync::Mutex<BufWriter<OwnedWriteHalf>>,
    reader: Mutex<Option<LineReader>>,
    status: ConnectionStatus,
}

impl Connection {
    /// Open a TCP stream to `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connection`] if the endpoint cannot be reached.
    /// There is no retry.
    pub async fn connect(addr: &str) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| {
                error!("RPC connect to {} failed: {}", addr, source);
                RpcError::Connection {
                    addr: addr.to_string(),
                    source,
                }
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", addr, e);
        }

        info!("RPC connected to {}", addr);
        Ok(Self::from_stream(addr.to_string(), stream))
    }

    fn from_stream(addr: String, stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();

        Self {
            addr,
            writer: tokio::sync::Mutex::new(BufWriter::new(write_half)),
            reader: Mutex::new(Some(LineReader {
                inner: BufReader::new(read_half),
            })),
            status: ConnectionStatus::default(),
        }
    }

    /// Address this connection was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Current lifecycle state of the stream.
    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    /// Write one complete message.
    ///
    /// Concurrent writers are serialized; a message is never split by another.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Write`] if the connection is closed or the write
    /// fails. A failed write closes the connection.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let mut writer = self.writer.lock().await;

        if self.status.state() == ConnectionState::Closed {
            return Err(RpcError::Write(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }

        trace!("RPC -> {}", String::from_utf8_lossy(bytes).trim_end());

        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| {
            self.status.mark_closed();
            RpcError::Write(e)
        })
    }

    /// Hand out the read half. Returns `Some` exactly once per connection.
    pub fn take_reader(&self) -> Option<LineReader> {
        self.reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Mark the connection closed and shut down the write half.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        self.status.mark_closed();
        if let Err(e) = writer.shutdown().await {
            debug!("RPC shutdown of {} failed: {}", self.addr, e);
        }
    }
}
