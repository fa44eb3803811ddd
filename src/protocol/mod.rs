//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the framing engine:
//! - Data frames (4-byte length + JSON-RPC text)
//! - Control frames (zero marker + 4-byte length + command code + body)
//! - Frame buffer for reassembling partial reads

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{encode_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    ControlCommand, FrameHeader, FrameKind, COMMAND_SIZE, CONTROL_HEADER_SIZE, DATA_HEADER_SIZE,
    DEFAULT_MAX_FRAME_SIZE,
};
