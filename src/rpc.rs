//! RPC client for communication with an Electrum server.
//!
//! This module multiplexes concurrent JSON-RPC calls over one persistent
//! TCP connection and routes out-of-order replies back to their callers.
//!
//! # Architecture
//!
//! ```text
//!  caller tasks                                         Electrum server
//! ┌────────────┐  register   ┌─────────────────┐
//! │ RpcClient  │────────────►│ PendingRegistry │
//! │  ::call()  │             └────────▲────────┘
//! │            │  write line          │ resolve(id)
//! │            │───────────► Connection ─────────────► TCP
//! └────────────┘                      │
//!                               reader task ◄───────── TCP
//! ```
//!
//! # Protocol
//!
//! One JSON object per line, no length prefix:
//!
//! ```text
//! {"jsonrpc":"2.0","method":"server.ping","params":[],"id":1}
//! {"jsonrpc":"2.0","result":null,"id":1}
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use electrumz_client::rpc::RpcClient;
//!
//! let client = RpcClient::connect("127.0.0.1:5555").await?;
//! let response = client.request("server.version", vec![]).await?;
//! ```

mod client;
pub mod codec;
mod connection;
mod error;
mod pending;
mod reader;

pub use client::{RpcClient, DEFAULT_TIMEOUT};
pub use connection::{Connection, ConnectionState, LineReader, ReadLine, MAX_LINE_SIZE};
pub use error::{DecodeError, RpcError};
pub use pending::{PendingHandle, PendingRegistry};
pub use reader::{ReaderHandle, ReaderState};
