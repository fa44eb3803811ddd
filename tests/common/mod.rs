//! Fake gateway for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use edge_pt_client::protocol::{ControlCommand, Frame, FrameBuffer};
use edge_pt_client::{Endpoint, Session, SessionBuilder, SessionState};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Upper bound for any single wait in a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Listening side of the fake gateway.
pub struct FakeGateway {
    listener: TcpListener,
    pub endpoint: Endpoint,
}

impl FakeGateway {
    pub async fn bind() -> Self {
        Self::from_listener(TcpListener::bind("127.0.0.1:0").await.unwrap())
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        let endpoint = Endpoint::Tcp(listener.local_addr().unwrap().to_string());
        Self { listener, endpoint }
    }

    pub async fn accept(&self) -> GatewayConn {
        let (stream, _) = tokio::time::timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("client did not connect")
            .unwrap();
        GatewayConn::new(stream)
    }

    /// Session builder with test-friendly timings.
    pub fn session(&self) -> SessionBuilder {
        Session::builder(self.endpoint.clone(), "test-pt")
            .start_grace(Duration::from_millis(10))
            .reconnect_delay(Duration::from_millis(20))
            .rpc_timeout(Duration::from_secs(2))
            .control_timeout(Duration::from_secs(2))
    }
}

/// One accepted client connection.
pub struct GatewayConn {
    stream: TcpStream,
    buffer: FrameBuffer,
    queued: VecDeque<Frame>,
}

impl GatewayConn {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::new(),
            queued: VecDeque::new(),
        }
    }

    pub async fn next_frame(&mut self) -> Frame {
        let mut buf = [0u8; 8192];
        loop {
            if let Some(frame) = self.queued.pop_front() {
                return frame;
            }
            let n = tokio::time::timeout(STEP_TIMEOUT, self.stream.read(&mut buf))
                .await
                .expect("no frame from client")
                .unwrap();
            assert!(n > 0, "client closed the connection");
            self.queued.extend(self.buffer.push(&buf[..n]).unwrap());
        }
    }

    pub async fn next_json(&mut self) -> Value {
        let frame = self.next_frame().await;
        assert!(frame.is_data(), "expected data frame, got {:?}", frame);
        serde_json::from_slice(frame.payload()).unwrap()
    }

    /// Read the next request and check its method.
    pub async fn expect_request(&mut self, method: &str) -> Value {
        let request = self.next_json().await;
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], method, "unexpected request {}", request);
        request
    }

    /// Read the next control frame and check its command.
    pub async fn expect_control(&mut self, command: ControlCommand) -> Bytes {
        let frame = self.next_frame().await;
        let (actual, body) = frame.control_command().unwrap();
        assert_eq!(actual, command);
        body
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn send_control(&mut self, command: ControlCommand, body: &[u8]) {
        let bytes = Frame::control(command, body).encode().unwrap();
        self.send_raw(&bytes).await;
    }

    pub async fn send_json(&mut self, value: Value) {
        let bytes = Frame::data(serde_json::to_vec(&value).unwrap())
            .encode()
            .unwrap();
        self.send_raw(&bytes).await;
    }

    pub async fn reply(&mut self, request: &Value, result: Value) {
        self.send_json(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            .await;
    }

    /// Answer READY / START / translator registration.
    pub async fn open_handshake(&mut self) {
        self.expect_control(ControlCommand::Ready).await;
        self.send_control(ControlCommand::Accept, &[]).await;
        self.expect_control(ControlCommand::Start).await;
        let register = self.expect_request("protocol_translator_register").await;
        self.reply(&register, json!("ok")).await;
    }

    /// Answer STOP with FINISH.
    pub async fn close_handshake(&mut self) {
        self.expect_control(ControlCommand::Stop).await;
        self.send_control(ControlCommand::Finish, &[]).await;
    }

    /// Send a `write` push notification and wait for its acknowledgement.
    pub async fn push_write(&mut self, id: u64, device_id: &str, route: [u32; 3], operation: i64, value: &str) {
        self.send_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "write",
            "params": {
                "uri": {
                    "deviceId": device_id,
                    "objectId": route[0],
                    "objectInstanceId": route[1],
                    "resourceId": route[2]
                },
                "operation": operation,
                "value": value
            }
        }))
        .await;
        let ack = self.next_json().await;
        assert_eq!(ack, json!({"jsonrpc": "2.0", "id": id, "result": "ok"}));
    }
}

/// Init `session` against `gateway`, answering the handshake.
pub async fn open_session(gateway: &FakeGateway, session: &Session) -> GatewayConn {
    let init = tokio::spawn({
        let session = session.clone();
        async move { session.init().await }
    });
    let mut conn = gateway.accept().await;
    conn.open_handshake().await;
    init.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Open);
    conn
}
