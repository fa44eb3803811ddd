//! Codec module - serialization for frame payloads and resource values.
//!
//! - [`JsonCodec`] - JSON-RPC text carried in data frames
//! - [`ValueCodec`] - typed resource values as big-endian bytes and base64
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the codec is chosen at compile time.

mod json;
mod value;

pub use json::JsonCodec;
pub use value::ValueCodec;
