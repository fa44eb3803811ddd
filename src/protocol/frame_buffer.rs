//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` as the carry buffer between reads.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForPrefix`: Need the first 4 bytes to tell data from control
//! - `WaitingForControlLength`: Zero prefix seen, need the 4-byte length
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! A frame is only emitted once every declared payload byte has arrived.
//!
//! # Example
//!
//! ```
//! use edge_pt_client::protocol::{encode_frame, FrameBuffer, FrameKind};
//!
//! let bytes = encode_frame(FrameKind::Data, b"{\"id\":1}").unwrap();
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::BytesMut;

use super::wire_format::{read_u32, FrameKind, DATA_HEADER_SIZE, DEFAULT_MAX_FRAME_SIZE};
use super::Frame;
use crate::error::{EdgeError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Need 4 bytes to discriminate the frame kind.
    WaitingForPrefix,
    /// Zero prefix consumed, need the control payload length.
    WaitingForControlLength,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { kind: FrameKind, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Carry buffer across socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 16MB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForPrefix,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames, in order.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if a header declares more than the configured
    /// maximum. The stream cannot be resynchronised after this.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForPrefix => {
                    if self.buffer.len() < DATA_HEADER_SIZE {
                        return Ok(None);
                    }
                    let prefix = read_u32(&self.buffer, 0);
                    let _ = self.buffer.split_to(DATA_HEADER_SIZE);

                    if prefix == 0 {
                        self.state = State::WaitingForControlLength;
                    } else {
                        self.begin_payload(FrameKind::Data, prefix)?;
                    }
                }

                State::WaitingForControlLength => {
                    if self.buffer.len() < DATA_HEADER_SIZE {
                        return Ok(None);
                    }
                    let length = read_u32(&self.buffer, 0);
                    let _ = self.buffer.split_to(DATA_HEADER_SIZE);
                    self.begin_payload(FrameKind::Control, length)?;
                }

                State::WaitingForPayload { kind, remaining } => {
                    let remaining = remaining as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForPrefix;
                    return Ok(Some(Frame::new(kind, payload)));
                }
            }
        }
    }

    fn begin_payload(&mut self, kind: FrameKind, length: u32) -> Result<()> {
        if length > self.max_frame_size {
            return Err(EdgeError::FrameTooLarge {
                length,
                max: self.max_frame_size,
            });
        }
        self.state = State::WaitingForPayload {
            kind,
            remaining: length,
        };
        Ok(())
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForControlLength => "WaitingForControlLength",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_frame, ControlCommand, CONTROL_HEADER_SIZE};

    fn data_bytes(payload: &[u8]) -> Vec<u8> {
        encode_frame(FrameKind::Data, payload).unwrap().to_vec()
    }

    fn control_bytes(command: ControlCommand, body: &[u8]) -> Vec<u8> {
        Frame::control(command, body).encode().unwrap().to_vec()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&data_bytes(b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_data());
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = data_bytes(b"first");
        combined.extend(control_bytes(ControlCommand::Accept, b"\x09"));
        combined.extend(data_bytes(b"third"));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"first");
        assert!(frames[1].is_control());
        assert_eq!(
            frames[1].control_command().unwrap().0,
            ControlCommand::Accept
        );
        assert_eq!(frames[2].payload(), b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_control_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = control_bytes(ControlCommand::Finish, b"");

        assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPrefix");

        assert!(buffer.push(&bytes[2..6]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForControlLength");

        assert!(buffer.push(&bytes[6..CONTROL_HEADER_SIZE]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&bytes[CONTROL_HEADER_SIZE..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].control_command().unwrap().0,
            ControlCommand::Finish
        );
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let bytes = data_bytes(payload);

        let frames = buffer.push(&bytes[..14]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&bytes[14..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
    }

    #[test]
    fn test_empty_control_payload() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0u8; CONTROL_HEADER_SIZE]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_control());
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_max_frame_size_validation() {
        let mut buffer = FrameBuffer::with_max_frame_size(100);
        let result = buffer.push(&1000u32.to_be_bytes());

        assert!(matches!(
            result,
            Err(EdgeError::FrameTooLarge {
                length: 1000,
                max: 100
            })
        ));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();
        let first = data_bytes(b"first");
        let second = control_bytes(ControlCommand::Accept, b"abc");

        let mut data = first.clone();
        data.extend_from_slice(&second[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(buffer.state_name(), "WaitingForControlLength");

        let frames = buffer.push(&second[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_control());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut stream = data_bytes(br#"{"jsonrpc":"2.0","id":1,"result":"ok"}"#);
        stream.extend(control_bytes(ControlCommand::Accept, b"\x00\x01"));

        let mut buffer = FrameBuffer::new();
        let mut all_frames = Vec::new();
        for byte in &stream {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 2);
        assert_eq!(
            all_frames[0].payload(),
            br#"{"jsonrpc":"2.0","id":1,"result":"ok"}"#
        );
        assert_eq!(
            all_frames[1].control_command().unwrap().1.as_ref(),
            &[0, 1]
        );
    }

    #[test]
    fn test_every_split_point() {
        let bytes = data_bytes(b"split me anywhere");
        for split in 0..=bytes.len() {
            let mut buffer = FrameBuffer::new();
            let mut frames = buffer.push(&bytes[..split]).unwrap();
            frames.extend(buffer.push(&bytes[split..]).unwrap());
            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0].payload(), b"split me anywhere");
        }
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&data_bytes(b"test")[..6]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");
        assert_eq!(buffer.len(), 2);

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForPrefix");
        assert!(buffer.is_empty());
    }
}
