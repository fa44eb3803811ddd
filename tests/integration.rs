//! Integration tests for edge-pt-client framing and codecs.
//!
//! These tests verify the integration between different modules.

use edge_pt_client::codec::{JsonCodec, ValueCodec};
use edge_pt_client::protocol::{encode_frame, ControlCommand, Frame, FrameBuffer, FrameKind};
use edge_pt_client::resource::{ResourceKind, ResourceValue};
use edge_pt_client::rpc::{Inbound, RpcRequest};
use edge_pt_client::EdgeError;
use serde_json::json;

/// Test full frame encode/decode cycle with a JSON-RPC payload.
#[test]
fn test_frame_with_json_rpc_payload() {
    let params = json!({"deviceId": "dev-1", "objects": []});
    let payload = JsonCodec::encode(&RpcRequest::new(7, "device_register", &params)).unwrap();
    let frame_bytes = encode_frame(FrameKind::Data, &payload).unwrap();

    // Length prefix is the payload length, big-endian.
    assert_eq!(&frame_bytes[..4], &(payload.len() as u32).to_be_bytes());

    let mut buffer = FrameBuffer::new();
    let frames = buffer.push(&frame_bytes).unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_data());

    let decoded: serde_json::Value = JsonCodec::decode(frames[0].payload()).unwrap();
    assert_eq!(decoded["method"], "device_register");
    assert_eq!(decoded["id"], 7);
    assert_eq!(decoded["params"], params);
}

/// Test data and control frames interleaved in one stream.
#[test]
fn test_mixed_frames_sequence() {
    let mut all_bytes = Vec::new();
    all_bytes.extend(Frame::control(ControlCommand::Accept, b"\x01\x02").encode().unwrap());
    for i in 1u64..=3 {
        let response = json!({"jsonrpc": "2.0", "id": i, "result": format!("r{}", i)});
        all_bytes.extend(Frame::data(serde_json::to_vec(&response).unwrap()).encode().unwrap());
    }
    all_bytes.extend(Frame::control(ControlCommand::Finish, b"").encode().unwrap());

    let mut buffer = FrameBuffer::new();
    let frames = buffer.push(&all_bytes).unwrap();
    assert_eq!(frames.len(), 5);

    let (first, body) = frames[0].control_command().unwrap();
    assert_eq!(first, ControlCommand::Accept);
    assert_eq!(&body[..], &[1, 2]);

    for (i, frame) in frames[1..4].iter().enumerate() {
        match Inbound::parse(frame.payload()).unwrap() {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, Some(i as u64 + 1));
                assert_eq!(outcome.unwrap(), json!(format!("r{}", i + 1)));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    assert_eq!(
        frames[4].control_command().unwrap().0,
        ControlCommand::Finish
    );
}

/// Test a stream delivered in arbitrary chunk sizes.
#[test]
fn test_chunked_delivery() {
    let mut all_bytes = Vec::new();
    for i in 0..10 {
        let payload = format!("{{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":null}}", i);
        all_bytes.extend(encode_frame(FrameKind::Data, payload.as_bytes()).unwrap());
    }

    for chunk_size in [1, 3, 7, 64, 1000] {
        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for chunk in all_bytes.chunks(chunk_size) {
            frames.extend(buffer.push(chunk).unwrap());
        }
        assert_eq!(frames.len(), 10, "chunk size {}", chunk_size);
        assert!(buffer.is_empty());
    }
}

/// Test a large payload across many reads.
#[test]
fn test_large_payload() {
    let text = "x".repeat(200 * 1024);
    let frame_bytes = encode_frame(FrameKind::Data, text.as_bytes()).unwrap();

    let mut buffer = FrameBuffer::new();
    let mut frames = Vec::new();
    for chunk in frame_bytes.chunks(16 * 1024) {
        frames.extend(buffer.push(chunk).unwrap());
    }

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload().len(), text.len());
}

/// Test that a zero length prefix never yields an empty data frame.
#[test]
fn test_empty_data_frame_rejected() {
    assert!(matches!(
        encode_frame(FrameKind::Data, &[]),
        Err(EdgeError::EmptyDataFrame)
    ));
    // A zero prefix starts a control frame instead.
    let control = encode_frame(FrameKind::Control, &[]).unwrap();
    assert_eq!(&control[..], &[0u8; 8]);
}

/// Test oversized frames are rejected before buffering the payload.
#[test]
fn test_frame_too_large() {
    let mut buffer = FrameBuffer::with_max_frame_size(16);
    let header = 17u32.to_be_bytes();
    assert!(matches!(
        buffer.push(&header),
        Err(EdgeError::FrameTooLarge { length: 17, max: 16 })
    ));
}

/// Test value encodings as they appear in the object model.
#[test]
fn test_value_encodings() {
    let cases = [
        (ResourceValue::Int(42), vec![0x00, 0x00, 0x00, 0x2A]),
        (ResourceValue::Float(1.5), 1.5f32.to_be_bytes().to_vec()),
        (ResourceValue::from("hi"), vec![0x68, 0x69]),
    ];
    for (value, expected) in cases {
        let bytes = ValueCodec::encode(&value);
        assert_eq!(bytes.to_vec(), expected);

        let text = ValueCodec::to_base64(&bytes);
        let back = ValueCodec::from_base64(&text).unwrap();
        assert_eq!(ValueCodec::decode(value.kind(), &back).unwrap(), value);
    }

    assert!(ValueCodec::encode_slot(None).is_empty());
    assert_eq!(ResourceKind::Function.wire_type(), "opaque");
}
