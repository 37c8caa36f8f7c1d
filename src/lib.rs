//! Electrumz client library
//!
//! This library provides the client side of the Electrum JSON-RPC protocol
//! over a single persistent, line-delimited TCP connection:
//!
//! - `rpc` - Connection, request dispatch, and reply correlation
//! - `config` - Client settings from file and environment
//! - `models` - Request/response wire types
//!
//! # RPC Module
//!
//! ```ignore
//! use electrumz_client::{config::ClientConfig, rpc::RpcClient};
//!
//! let config = ClientConfig::load()?;
//! let client = RpcClient::connect_with_config(&config).await?;
//! let latency = client.ping().await?;
//! ```

pub mod config;
pub mod models;
pub mod rpc;
