//! Wire format encoding and decoding.
//!
//! Two frame layouts share one stream:
//! ```text
//! Data frame:
//! ┌──────────────┬──────────────────────────┐
//! │ Length (≠ 0) │ JSON-RPC text            │
//! │ uint32 BE    │ Length bytes             │
//! └──────────────┴──────────────────────────┘
//!
//! Control frame:
//! ┌──────────────┬──────────────┬───────────┬──────────────┐
//! │ 0x00000000   │ Length       │ Command   │ Body         │
//! │ 4 bytes      │ uint32 BE    │ uint32 BE │ Length - 4   │
//! └──────────────┴──────────────┴───────────┴──────────────┘
//! ```
//!
//! A zero length prefix is what marks a control frame, so data frames can
//! never be empty.

use crate::error::{EdgeError, Result};

/// Size of the data frame header (length prefix).
pub const DATA_HEADER_SIZE: usize = 4;

/// Size of the control frame header (zero marker + length).
pub const CONTROL_HEADER_SIZE: usize = 8;

/// Size of the command code at the start of every control payload.
pub const COMMAND_SIZE: usize = 4;

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Handshake command carried in the first 4 bytes of a control payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ControlCommand {
    /// Gateway accepts the translator.
    Accept = 1,
    /// Translator starts the session.
    Start = 2,
    /// Translator asks to stop.
    Stop = 3,
    /// Translator is ready to handshake.
    Ready = 4,
    /// Gateway confirms stop.
    Finish = 5,
}

impl ControlCommand {
    /// Numeric command code.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Big-endian command code bytes.
    #[inline]
    pub fn to_bytes(self) -> [u8; COMMAND_SIZE] {
        self.code().to_be_bytes()
    }

    /// Upper-case name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::Accept => "ACCEPT",
            ControlCommand::Start => "START",
            ControlCommand::Stop => "STOP",
            ControlCommand::Ready => "READY",
            ControlCommand::Finish => "FINISH",
        }
    }
}

impl TryFrom<u32> for ControlCommand {
    type Error = EdgeError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            1 => Ok(ControlCommand::Accept),
            2 => Ok(ControlCommand::Start),
            3 => Ok(ControlCommand::Stop),
            4 => Ok(ControlCommand::Ready),
            5 => Ok(ControlCommand::Finish),
            other => Err(EdgeError::ProtocolViolation(format!(
                "unknown control command code {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of frame, discriminated by the first 4 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// JSON-RPC text.
    Data,
    /// Handshake command.
    Control,
}

impl FrameKind {
    /// Header size for this kind.
    #[inline]
    pub fn header_size(self) -> usize {
        match self {
            FrameKind::Data => DATA_HEADER_SIZE,
            FrameKind::Control => CONTROL_HEADER_SIZE,
        }
    }
}

/// Header bytes for a frame, sized for the larger control layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    bytes: [u8; CONTROL_HEADER_SIZE],
    len: usize,
}

impl FrameHeader {
    /// Encode a header for `kind` carrying `payload_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `EmptyDataFrame` for a data frame with no payload.
    pub fn new(kind: FrameKind, payload_length: u32) -> Result<Self> {
        let mut bytes = [0u8; CONTROL_HEADER_SIZE];
        match kind {
            FrameKind::Data => {
                if payload_length == 0 {
                    return Err(EdgeError::EmptyDataFrame);
                }
                bytes[..4].copy_from_slice(&payload_length.to_be_bytes());
            }
            FrameKind::Control => {
                bytes[4..8].copy_from_slice(&payload_length.to_be_bytes());
            }
        }
        Ok(Self {
            bytes,
            len: kind.header_size(),
        })
    }

    /// The encoded header.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Encoded header size.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; headers are 4 or 8 bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Read the big-endian u32 at `offset`.
///
/// Caller guarantees `buf.len() >= offset + 4`.
#[inline]
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
