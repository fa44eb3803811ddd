//! Resource value codec.
//!
//! Values travel as raw big-endian bytes, base64-encoded inside JSON:
//! - Int: 4-byte signed integer
//! - Float: 4-byte IEEE-754
//! - String: UTF-8 text
//! - Function: empty
//!
//! # Example
//!
//! ```
//! use edge_pt_client::codec::ValueCodec;
//! use edge_pt_client::resource::ResourceValue;
//!
//! let bytes = ValueCodec::encode(&ResourceValue::Int(42));
//! assert_eq!(&bytes[..], &[0, 0, 0, 0x2A]);
//! assert_eq!(ValueCodec::to_base64(&bytes), "AAAAKg==");
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::{EdgeError, Result};
use crate::resource::{ResourceKind, ResourceValue};

/// Codec between typed resource values and wire bytes.
pub struct ValueCodec;

impl ValueCodec {
    /// Encode a value to its raw wire bytes.
    pub fn encode(value: &ResourceValue) -> Bytes {
        match value {
            ResourceValue::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            ResourceValue::Int(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
            ResourceValue::Float(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        }
    }

    /// Encode an optional value; function routes (no value) encode empty.
    pub fn encode_slot(value: Option<&ResourceValue>) -> Bytes {
        value.map(Self::encode).unwrap_or_default()
    }

    /// Decode raw bytes received for a route of `kind`.
    ///
    /// Ints accept 4-byte (i32) or range-checked 8-byte (i64) payloads,
    /// floats accept 4-byte (f32) or 8-byte (f64).
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for wrong lengths, out-of-range ints, invalid
    /// UTF-8, or the function kind.
    pub fn decode(kind: ResourceKind, bytes: &[u8]) -> Result<ResourceValue> {
        let invalid = |reason: String| EdgeError::InvalidValue {
            kind: kind.wire_type(),
            reason,
        };

        match kind {
            ResourceKind::String => std::str::from_utf8(bytes)
                .map(|s| ResourceValue::String(s.to_string()))
                .map_err(|e| invalid(e.to_string())),

            ResourceKind::Int => match bytes.len() {
                4 => Ok(ResourceValue::Int(i32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))),
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    let wide = i64::from_be_bytes(buf);
                    i32::try_from(wide)
                        .map(ResourceValue::Int)
                        .map_err(|_| invalid(format!("{} does not fit 32 bits", wide)))
                }
                n => Err(invalid(format!("expected 4 or 8 bytes, got {}", n))),
            },

            ResourceKind::Float => match bytes.len() {
                4 => Ok(ResourceValue::Float(f32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))),
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Ok(ResourceValue::Float(f64::from_be_bytes(buf) as f32))
                }
                n => Err(invalid(format!("expected 4 or 8 bytes, got {}", n))),
            },

            ResourceKind::Function => Err(invalid("function routes carry no value".into())),
        }
    }

    /// Standard base64 with padding.
    pub fn to_base64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    /// Decode standard base64.
    pub fn from_base64(text: &str) -> Result<Bytes> {
        STANDARD
            .decode(text)
            .map(Bytes::from)
            .map_err(|e| EdgeError::InvalidValue {
                kind: "base64",
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_int() {
        assert_eq!(
            &ValueCodec::encode(&ResourceValue::Int(42))[..],
            &[0x00, 0x00, 0x00, 0x2A]
        );
        assert_eq!(
            &ValueCodec::encode(&ResourceValue::Int(-1))[..],
            &[0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_encode_float() {
        assert_eq!(
            &ValueCodec::encode(&ResourceValue::Float(1.5))[..],
            &[0x3F, 0xC0, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_string() {
        assert_eq!(
            &ValueCodec::encode(&ResourceValue::String("hi".into()))[..],
            &[0x68, 0x69]
        );
    }

    #[test]
    fn test_encode_function_slot_is_empty() {
        assert!(ValueCodec::encode_slot(None).is_empty());
        assert_eq!(ValueCodec::to_base64(&ValueCodec::encode_slot(None)), "");
    }

    #[test]
    fn test_decode_int_widths() {
        assert_eq!(
            ValueCodec::decode(ResourceKind::Int, &[0, 0, 0, 0x14]).unwrap(),
            ResourceValue::Int(20)
        );
        assert_eq!(
            ValueCodec::decode(ResourceKind::Int, &(-7i64).to_be_bytes()).unwrap(),
            ResourceValue::Int(-7)
        );
        assert!(ValueCodec::decode(ResourceKind::Int, &i64::MAX.to_be_bytes()).is_err());
        assert!(ValueCodec::decode(ResourceKind::Int, &[1, 2]).is_err());
    }

    #[test]
    fn test_decode_float_widths() {
        assert_eq!(
            ValueCodec::decode(ResourceKind::Float, &1.5f32.to_be_bytes()).unwrap(),
            ResourceValue::Float(1.5)
        );
        assert_eq!(
            ValueCodec::decode(ResourceKind::Float, &2.25f64.to_be_bytes()).unwrap(),
            ResourceValue::Float(2.25)
        );
        assert!(ValueCodec::decode(ResourceKind::Float, &[0; 3]).is_err());
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(
            ValueCodec::decode(ResourceKind::String, "héllo".as_bytes()).unwrap(),
            ResourceValue::String("héllo".into())
        );
        assert!(matches!(
            ValueCodec::decode(ResourceKind::String, &[0xFF, 0xFE]),
            Err(EdgeError::InvalidValue { kind: "string", .. })
        ));
    }

    #[test]
    fn test_decode_function_rejected() {
        assert!(ValueCodec::decode(ResourceKind::Function, b"").is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(ValueCodec::to_base64(&[0, 0, 0, 0x14]), "AAAAFA==");
        assert_eq!(
            &ValueCodec::from_base64("AAAAFA==").unwrap()[..],
            &[0, 0, 0, 0x14]
        );
        assert!(ValueCodec::from_base64("not base64!").is_err());
    }
}
