//! Wire data models for the Electrum JSON-RPC protocol.
//!
//! These structs mirror the JSON objects exchanged with an Electrum server,
//! one object per line. Method semantics are opaque here: params, results
//! and errors are carried as raw [`serde_json::Value`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version tag sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Electrum protocol methods exercised by the probe's `--all` walk.
pub const ELECTRUM_METHODS: &[&str] = &[
    "blockchain.block.header",
    "blockchain.block.headers",
    "blockchain.estimatefee",
    "blockchain.headers.subscribe",
    "blockchain.relayfee",
    "blockchain.scripthash.get_balance",
    "blockchain.scripthash.get_history",
    "blockchain.scripthash.get_mempool",
    "blockchain.scripthash.history",
    "blockchain.scripthash.listunspent",
    "blockchain.scripthash.subscribe",
    "blockchain.scripthash.utxos",
    "blockchain.transaction.broadcast",
    "blockchain.transaction.get",
    "blockchain.transaction.get_merkle",
    "blockchain.transaction.id_from_pos",
    "mempool.changes",
    "mempool.get_fee_histogram",
    "server.add_peer",
    "server.banner",
    "server.donation_address",
    "server.features",
    "server.peers.subscribe",
    "server.ping",
    "server.version",
];

/// An outbound JSON-RPC request.
///
/// Field order is the serialization order: `jsonrpc`, `method`, `params`, `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id,
        }
    }
}

/// An inbound JSON-RPC response.
///
/// `result` defaults to `null` when absent. `error` is `None` when absent
/// or explicitly `null`; any other value marks the response as a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub id: u64,
}

impl Response {
    /// Whether the server reported a failure for this call.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split the response into its result or a structured server error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::rpc::RpcError::Server`] if `error` is present.
    pub fn into_result(self) -> Result<Value, crate::rpc::RpcError> {
        match self.error {
            Some(err) => Err(ErrorObject::from_value(err).into()),
            None => Ok(self.result),
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Interpret an arbitrary `error` value.
    ///
    /// Values that are not `{code, message}` objects are kept verbatim as the
    /// message with code `0`.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<ErrorObject>(value.clone()) {
            Ok(obj) => obj,
            Err(_) => ErrorObject {
                code: 0,
                message: match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_field_order() {
        let request = Request::new(7, "server.version", vec![json!("probe"), json!("1.4")]);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","method":"server.version","params":["probe","1.4"],"id":7}"#
        );
    }

    #[test]
    fn test_response_null_result() {
        let json = r#"{"jsonrpc":"2.0","result":null,"id":1}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, 1);
        assert_eq!(response.result, Value::Null);
        assert!(!response.is_error());
    }

    #[test]
    fn test_response_null_error_is_success() {
        let json = r#"{"jsonrpc":"2.0","result":5,"error":null,"id":3}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert!(!response.is_error());
        assert_eq!(response.into_result().unwrap(), json!(5));
    }

    #[test]
    fn test_into_result_server_error() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"unknown method"},"id":2}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert!(response.is_error());

        match response.into_result() {
            Err(crate::rpc::RpcError::Server { code, message, data }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "unknown method");
                assert!(data.is_none());
            }
            other => panic!("Expected server error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_object_from_plain_string() {
        let obj = ErrorObject::from_value(json!("daemon unavailable"));
        assert_eq!(obj.code, 0);
        assert_eq!(obj.message, "daemon unavailable");
    }

    #[test]
    fn test_method_catalogue_has_ping() {
        assert!(ELECTRUM_METHODS.contains(&"server.ping"));
        assert_eq!(ELECTRUM_METHODS.len(), 25);
    }
}
