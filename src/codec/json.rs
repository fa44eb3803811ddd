//! JSON codec for data frame payloads.
//!
//! Every data frame carries one UTF-8 JSON-RPC 2.0 message.
//!
//! # Example
//!
//! ```
//! use edge_pt_client::codec::JsonCodec;
//! use serde_json::{json, Value};
//!
//! let encoded = JsonCodec::encode(&json!({"id": 1})).unwrap();
//! let decoded: Value = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["id"], 1);
//! ```

use bytes::Bytes;

use crate::error::Result;

/// JSON codec for RPC text.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid JSON for type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
