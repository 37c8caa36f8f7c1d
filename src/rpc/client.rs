//! JSON-RPC client for Electrum servers over one shared TCP connection.
//!
//! This module provides `RpcClient`, an async client that multiplexes any
//! number of concurrent calls over a single line-delimited stream. Replies
//! may arrive in any order; each is routed back to its caller by id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::models::{Request, Response};
use crate::rpc::codec;
use crate::rpc::connection::{Connection, ConnectionState};
use crate::rpc::error::RpcError;
use crate::rpc::pending::PendingRegistry;
use crate::rpc::reader::{ReaderHandle, ReaderState};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// RPC client for an Electrum server.
///
/// The client owns one TCP connection and one background reader task.
/// `call` takes `&self`, so a client wrapped in an `Arc` can be shared by
/// any number of tasks issuing requests concurrently.
///
/// # Example
///
/// ```ignore
/// use electrumz_client::rpc::RpcClient;
/// use serde_json::json;
///
/// let client = RpcClient::connect("127.0.0.1:5555").await?;
///
/// let banner = client.request("server.banner", vec![]).await?;
/// let header = client
///     .call("blockchain.block.header", vec![json!(100)], Duration::from_secs(5))
///     .await?;
/// ```
pub struct RpcClient {
    connection: Connection,
    registry: Arc<PendingRegistry>,
    /// Next id to hand out. Ids start at 1 and are never reused.
    next_id: AtomicU64,
    /// Default bound for `request` and `ping`.
    timeout: Duration,
    reader: Option<ReaderHandle>,
}

impl RpcClient {
    /// Connect to the server at `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Connection` if the server is unreachable.
    pub async fn connect(addr: &str) -> Result<Self, RpcError> {
        let connection = Connection::connect(addr).await?;
        Ok(Self::from_connection(connection))
    }

    /// Connect using the address and default timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Connection` if the server is unreachable.
    pub async fn connect_with_config(config: &ClientConfig) -> Result<Self, RpcError> {
        let mut client = Self::connect(&config.address()).await?;
        client.set_timeout(config.request_timeout);
        Ok(client)
    }

    /// Wrap an open connection and start its reader task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_connection(connection: Connection) -> Self {
        let registry = Arc::new(PendingRegistry::new());

        let reader = match connection.take_reader() {
            Some(line_reader) => Some(ReaderHandle::spawn(
                line_reader,
                Arc::clone(&registry),
                connection.status(),
            )),
            None => {
                warn!(
                    "Read half of {} already taken; replies will not be delivered",
                    connection.addr()
                );
                None
            }
        };

        Self {
            connection,
            registry,
            next_id: AtomicU64::new(1),
            timeout: DEFAULT_TIMEOUT,
            reader,
        }
    }

    /// Set the default request timeout.
    ///
    /// Default is 30 seconds.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Default bound used by `request` and `ping`.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait up to `timeout` for its response.
    ///
    /// This method:
    /// 1. Allocates a fresh id
    /// 2. Registers a completion handle for it
    /// 3. Writes the encoded request to the shared stream
    /// 4. Waits for the reader to deliver the matching response
    ///
    /// The returned `Response` may carry a server-side `error`; use
    /// [`Response::into_result`] to turn that into an `Err`.
    ///
    /// # Errors
    ///
    /// - `RpcError::Write` if the request could not be sent (no wait happens)
    /// - `RpcError::Timeout` if no response arrived in time
    /// - `RpcError::Encode` if `params` could not be serialized
    /// - `RpcError::DuplicateId` if the id allocator is broken
    ///
    /// On every path the registry entry for this call is removed before
    /// returning.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Response, RpcError> {
        let id = self.next_id();
        let mut handle = self.registry.register(id)?;

        let request = Request::new(id, method, params);
        let line = codec::encode(&request).map_err(RpcError::Encode)?;

        if let Err(e) = self.connection.write(&line).await {
            self.registry.cancel(id);
            warn!("Request {} ({}) not sent: {}", id, method, e);
            return Err(e);
        }

        match tokio::time::timeout(timeout, handle.recv()).await {
            Ok(result) => result,
            Err(_) => {
                self.registry.cancel(id);
                warn!("Request {} ({}) timed out after {:?}", id, method, timeout);
                Err(RpcError::Timeout { id, after: timeout })
            }
        }
    }

    /// Send a request bounded by the client's default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`RpcClient::call`].
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Response, RpcError> {
        self.call(method, params, self.timeout).await
    }

    /// Send `server.ping` and measure the round-trip latency.
    ///
    /// # Errors
    ///
    /// Same as [`RpcClient::call`], plus `RpcError::Server` if the server
    /// answers with an error.
    pub async fn ping(&self) -> Result<Duration, RpcError> {
        let start = Instant::now();
        self.request("server.ping", Vec::new()).await?.into_result()?;
        let latency = start.elapsed();
        debug!("server.ping round trip {:?}", latency);
        Ok(latency)
    }

    /// Generate the next request id.
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Highest id handed out so far, if any.
    pub fn last_issued_id(&self) -> Option<u64> {
        match self.next_id.load(Ordering::SeqCst) {
            1 => None,
            next => Some(next - 1),
        }
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the background reader is still running.
    pub fn reader_state(&self) -> ReaderState {
        self.reader
            .as_ref()
            .map_or(ReaderState::Stopped, ReaderHandle::state)
    }

    /// Whether the underlying stream is still open.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Address the client is connected to.
    pub fn addr(&self) -> &str {
        self.connection.addr()
    }

    /// Stop the reader task and close the connection.
    ///
    /// Calls still in flight fail with `RpcError::Timeout` once their bound
    /// expires.
    pub async fn shutdown(mut self) {
        if let Some(reader) = self.reader.take() {
            reader.shutdown().await;
        }
        self.connection.close().await;
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        if let Some(reader) = &self.reader {
            reader.stop();
        }
    }
}
