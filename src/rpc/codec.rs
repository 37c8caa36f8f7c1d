//! Newline-delimited JSON framing for Electrum RPC.
//!
//! # Wire Format
//!
//! ```text
//! {"jsonrpc":"2.0","method":"server.ping","params":[],"id":1}\n
//! ```
//!
//! One compact JSON object per line, no length prefix. Compact serialization
//! escapes control characters inside strings, so an encoded request never
//! contains a raw newline before its delimiter.

use crate::models::{Request, Response};
use crate::rpc::error::DecodeError;

/// Line delimiter on the wire.
pub const DELIMITER: u8 = b'\n';

/// Encode a request as a single delimited line.
///
/// # Errors
///
/// Returns the serializer error if a param cannot be represented as JSON.
pub fn encode(request: &Request) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(request)?;
    line.push(DELIMITER);
    Ok(line)
}

/// Decode one line into a response.
///
/// A trailing `\n` or `\r\n` is ignored.
///
/// # Errors
///
/// - [`DecodeError::Empty`] for a blank line
/// - [`DecodeError::MissingId`] if `id` is absent or `null`
/// - [`DecodeError::Malformed`] for anything else that is not a response object
pub fn decode(line: &[u8]) -> Result<Response, DecodeError> {
    let line = trim_delimiter(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let value: serde_json::Value = serde_json::from_slice(line).map_err(DecodeError::Malformed)?;
    if value.get("id").map_or(true, serde_json::Value::is_null) {
        return Err(DecodeError::MissingId);
    }

    serde_json::from_value(value).map_err(DecodeError::Malformed)
}

fn trim_delimiter(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
