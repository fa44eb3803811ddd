//! Frame struct and encoder.
//!
//! A frame is either a data frame (JSON-RPC text) or a control frame
//! (handshake command). Payloads use `bytes::Bytes` for zero-copy sharing.
//!
//! # Example
//!
//! ```
//! use edge_pt_client::protocol::{encode_frame, FrameKind};
//!
//! let bytes = encode_frame(FrameKind::Data, b"{}").unwrap();
//! assert_eq!(&bytes[..], &[0, 0, 0, 2, b'{', b'}']);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{read_u32, ControlCommand, FrameHeader, FrameKind, COMMAND_SIZE};
use crate::error::{EdgeError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Data or control.
    pub kind: FrameKind,
    /// Payload bytes, header stripped.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: FrameKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    /// Create a data frame.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Data, payload.into())
    }

    /// Create a control frame whose payload is `command` followed by `body`.
    pub fn control(command: ControlCommand, body: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(COMMAND_SIZE + body.len());
        payload.put_u32(command.code());
        payload.extend_from_slice(body);
        Self::new(FrameKind::Control, payload.freeze())
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check if this is a data frame.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.kind == FrameKind::Data
    }

    /// Check if this is a control frame.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.kind == FrameKind::Control
    }

    /// Split a control payload into its command and trailing body.
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if the payload cannot hold a command code
    /// - `ProtocolViolation` for a data frame or an unknown command code
    pub fn control_command(&self) -> Result<(ControlCommand, Bytes)> {
        if !self.is_control() {
            return Err(EdgeError::ProtocolViolation(
                "expected a control frame, got a data frame".into(),
            ));
        }
        if self.payload.len() < COMMAND_SIZE {
            return Err(EdgeError::LengthMismatch {
                declared: COMMAND_SIZE,
                actual: self.payload.len(),
            });
        }
        let command = ControlCommand::try_from(read_u32(&self.payload, 0))?;
        Ok((command, self.payload.slice(COMMAND_SIZE..)))
    }

    /// Encode this frame to wire bytes.
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(self.kind, &self.payload)
    }
}

/// Encode a frame as a single contiguous buffer.
///
/// # Errors
///
/// - `EmptyDataFrame` for a data frame with an empty payload
/// - `FrameTooLarge` if the payload does not fit a u32 length
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> Result<Bytes> {
    let length = u32::try_from(payload.len()).map_err(|_| EdgeError::FrameTooLarge {
        length: u32::MAX,
        max: u32::MAX,
    })?;
    let header = FrameHeader::new(kind, length)?;
    let mut buf = BytesMut::with_capacity(header.len() + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}
