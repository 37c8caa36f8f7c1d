//! Background demultiplexer: the one and only reader of the stream.
//!
//! The task reads a line, decodes it, and resolves the matching pending
//! entry, forever, until the peer hangs up or the client cancels it.
//! Malformed lines and replies for unknown ids are logged and skipped.
//! Calls still pending when the reader stops are not failed here; each one
//! finds out through its own timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::rpc::codec;
use crate::rpc::connection::{ConnectionStatus, LineReader, ReadLine, MAX_LINE_SIZE};
use crate::rpc::error::{DecodeError, RpcError};
use crate::rpc::pending::PendingRegistry;

/// Lifecycle of the reader task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Running,
    /// Terminal. No further reads occur.
    Stopped,
}

/// Owner's view of a spawned reader task.
#[derive(Debug)]
pub struct ReaderHandle {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ReaderHandle {
    /// Spawn the reader task on the current runtime.
    pub(crate) fn spawn(
        reader: LineReader,
        registry: Arc<PendingRegistry>,
        status: ConnectionStatus,
    ) -> Self {
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));

        let join = tokio::spawn(run(
            reader,
            registry,
            status,
            cancel.clone(),
            Arc::clone(&running),
        ));

        Self {
            cancel,
            running,
            join,
        }
    }

    /// Whether the task is still reading.
    pub fn state(&self) -> ReaderState {
        if self.running.load(Ordering::Acquire) {
            ReaderState::Running
        } else {
            ReaderState::Stopped
        }
    }

    /// Signal the task to stop. Does not wait for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Signal the task to stop and wait until it has exited.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!("RPC reader task ended abnormally: {}", e);
        }
    }
}

async fn run(
    mut reader: LineReader,
    registry: Arc<PendingRegistry>,
    status: ConnectionStatus,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
) {
    debug!("RPC reader started");

    loop {
        // Cancellation may abandon a half-read line. The reader never resumes
        // after that, so no later read can see a torn line.
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("RPC reader cancelled");
                break;
            }
            line = reader.read_line() => line,
        };

        match line {
            ReadLine::EndOfStream => {
                info!("RPC connection closed by peer; reader stopped");
                status.mark_closed();
                break;
            }
            ReadLine::Oversized(len) => {
                let err = RpcError::from(DecodeError::TooLong {
                    len,
                    max: MAX_LINE_SIZE,
                });
                warn!("{}; line dropped", err);
            }
            ReadLine::Line(bytes) => match route_line(&registry, &bytes) {
                Ok(id) => debug!("RPC reply {} delivered", id),
                Err(RpcError::Decode(DecodeError::Empty)) => {
                    debug!("RPC reader skipped blank line");
                }
                Err(RpcError::UnmatchedReply(id)) => {
                    warn!("Unknown reply id={} {}", id, String::from_utf8_lossy(&bytes).trim_end());
                }
                Err(e) => {
                    warn!("{}: {}", e, String::from_utf8_lossy(&bytes).trim_end());
                }
            },
        }
    }

    running.store(false, Ordering::Release);
}

/// Decode one inbound line and hand it to its waiter.
///
/// Returns the id that was delivered.
///
/// # Errors
///
/// - [`RpcError::Decode`] if the line is not a response
/// - [`RpcError::UnmatchedReply`] if no call is waiting for the id
pub(crate) fn route_line(registry: &PendingRegistry, line: &[u8]) -> Result<u64, RpcError> {
    let response = codec::decode(line)?;
    let id = response.id;

    if registry.resolve(id, response) {
        Ok(id)
    } else {
        Err(RpcError::UnmatchedReply(id))
    }
}
