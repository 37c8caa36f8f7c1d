//! Error types for the RPC client.

use std::time::Duration;

use thiserror::Error;

use crate::models::ErrorObject;

/// A single inbound line that could not be turned into a [`crate::models::Response`].
///
/// Decode failures are reported by the reader and skipped; they never reach
/// a caller of [`crate::rpc::RpcClient::call`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line held no data besides its delimiter.
    #[error("empty line")]
    Empty,

    /// The line was not a well-formed response object.
    #[error("malformed response: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The object had no usable `id` member.
    #[error("response is missing an id")]
    MissingId,

    /// The line exceeded the inbound size limit and was discarded.
    #[error("line of {len} bytes exceeds maximum {max} bytes")]
    TooLong { len: usize, max: usize },
}

/// Errors surfaced by the RPC client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Could not open the TCP stream. Fatal to the client instance.
    #[error("Connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be written to the shared stream.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    /// An inbound line could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No response arrived within the caller's bound.
    #[error("Request {id} timed out after {after:?}")]
    Timeout { id: u64, after: Duration },

    /// A response carried an id with no pending entry.
    #[error("Unmatched reply for id {0}")]
    UnmatchedReply(u64),

    /// An id was registered twice. Indicates a broken id allocator.
    #[error("Duplicate request id {0}")]
    DuplicateId(u64),

    /// The completion handle was dropped before a response arrived.
    #[error("Request {id} was cancelled")]
    Cancelled { id: u64 },

    /// The request could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Server returned a JSON-RPC error response.
    #[error("Server error {code}: {message}")]
    Server {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Optional additional data
        data: Option<serde_json::Value>,
    },
}

impl From<ErrorObject> for RpcError {
    fn from(err: ErrorObject) -> Self {
        RpcError::Server {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let timeout_err = RpcError::Timeout {
            id: 4,
            after: Duration::from_millis(250),
        };
        assert_eq!(timeout_err.to_string(), "Request 4 timed out after 250ms");

        let server_err = RpcError::Server {
            code: -32000,
            message: "Daemon error".to_string(),
            data: None,
        };
        assert_eq!(server_err.to_string(), "Server error -32000: Daemon error");

        assert_eq!(
            RpcError::UnmatchedReply(9).to_string(),
            "Unmatched reply for id 9"
        );
        assert_eq!(
            RpcError::from(DecodeError::MissingId).to_string(),
            "Decode error: response is missing an id"
        );
    }

    #[test]
    fn test_decode_error_too_long_display() {
        let err = DecodeError::TooLong { len: 2048, max: 1024 };
        assert_eq!(
            RpcError::from(err).to_string(),
            "Decode error: line of 2048 bytes exceeds maximum 1024 bytes"
        );
    }

    #[test]
    fn test_rpc_error_from_error_object() {
        let obj = ErrorObject {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({"method": "unknown"})),
        };

        match RpcError::from(obj) {
            RpcError::Server { code, message, data } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
                assert!(data.is_some());
            }
            other => panic!("Expected Server, got {:?}", other),
        }
    }
}
