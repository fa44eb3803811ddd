//! A live connection to the gateway.
//!
//! One read loop owns the inbound half and feeds a single demultiplexer
//! keyed by frame kind:
//!
//! ```text
//!                      ┌─ Data ─┬─ response ─► PendingCalls (by id)
//! socket ─► FrameBuffer┤        └─ request  ─► push handler ─► EventBus
//!                      └─ Control ─────────► control queue ─► send_control_command
//! ```
//!
//! Outbound frames all go through the writer task.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::JsonCodec;
use crate::error::{EdgeError, Result};
use crate::protocol::{ControlCommand, Frame, FrameBuffer, FrameKind, DEFAULT_MAX_FRAME_SIZE};
use crate::rpc::{
    EventBus, Inbound, PendingCalls, ResourceEvent, RpcRequest, RpcResponse, METHOD_NOT_FOUND,
    WRITE_METHOD,
};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Default round-trip timeout for RPC calls.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default round-trip timeout for control command replies.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC "invalid params" error code.
const INVALID_PARAMS: i64 = -32602;

/// Control frames queued for a waiter before new ones are dropped.
const CONTROL_QUEUE_CAPACITY: usize = 8;

/// Read buffer size.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for each RPC call.
    pub rpc_timeout: Duration,
    /// Timeout for a control command reply.
    pub control_timeout: Duration,
    /// Largest accepted inbound payload.
    pub max_frame_size: u32,
    /// Writer task settings.
    pub writer: WriterConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

/// Reply to a control command, with the 8-byte frame header stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    /// Command code of the reply.
    pub command: ControlCommand,
    /// Bytes after the command code.
    pub body: Bytes,
}

/// Removes the pending entry when a call ends by any path.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.remove(self.id).is_some() {
            tracing::debug!(id = self.id, "removed unanswered pending call");
        }
    }
}

/// A connected, framed transport.
pub struct Connection {
    writer: WriterHandle,
    pending: Arc<PendingCalls>,
    control_rx: Mutex<mpsc::Receiver<Frame>>,
    closed: CancellationToken,
    config: ConnectionConfig,
    _read_task: JoinHandle<()>,
}

impl Connection {
    /// Start the read loop and writer task over `stream`.
    ///
    /// Push notifications are published on `events`.
    pub fn start<S>(stream: S, events: EventBus, config: ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, config.writer.clone());
        let pending = Arc::new(PendingCalls::new());
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let closed = CancellationToken::new();

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            if let Ok(Err(e)) = writer_task.await {
                tracing::error!(error = %e, "writer task failed");
            }
            writer_closed.cancel();
        });

        let dispatcher = Dispatcher {
            pending: pending.clone(),
            writer: writer.clone(),
            control_tx,
            events,
        };
        let read_closed = closed.clone();
        let max_frame_size = config.max_frame_size;
        let read_task = tokio::spawn(async move {
            match read_loop(reader, &dispatcher, &read_closed, max_frame_size).await {
                Ok(()) => tracing::info!("connection closed"),
                Err(e) => tracing::error!(error = %e, "read loop error"),
            }
            read_closed.cancel();
        });

        Self {
            writer,
            pending,
            control_rx: Mutex::new(control_rx),
            closed,
            config,
            _read_task: read_task,
        }
    }

    /// Check whether the transport is still usable.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Wait until the transport closes.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Call `method` and wait for its response.
    ///
    /// Calls may be issued concurrently; each gets its own id and timeout.
    ///
    /// # Errors
    ///
    /// - `ConnectionClosed` if the transport is closed
    /// - `Timeout` if the request is not queued and answered within the
    ///   configured interval
    /// - `Rpc` if the gateway answers with an error
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_open() {
            return Err(EdgeError::ConnectionClosed);
        }

        let (id, rx) = self.pending.register(method);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let frame = OutboundFrame::data(JsonCodec::encode(&RpcRequest::new(id, method, &params))?)?;
        let exchange = async {
            self.writer.send(frame).await?;
            tracing::debug!(id, method, "sent request");
            rx.await.map_err(|_| EdgeError::ConnectionClosed)?
        };

        // Queueing counts against the timeout; a stalled writer must not hang callers.
        match tokio::time::timeout(self.config.rpc_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(id, method, timeout = ?self.config.rpc_timeout, "call timed out");
                Err(EdgeError::Timeout {
                    operation: method.to_string(),
                    timeout: self.config.rpc_timeout,
                })
            }
        }
    }

    /// Send a control command, optionally waiting for the next control reply.
    ///
    /// Control frames that arrived before this command was sent are stale and
    /// are discarded, so a reply always belongs to this exchange.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the command is not queued (and answered, when waiting)
    ///   within the configured interval
    /// - `LengthMismatch` if the reply is too short to hold a command code
    /// - `ProtocolViolation` if the reply carries an unknown command code
    pub async fn send_control_command(
        &self,
        command: ControlCommand,
        body: &[u8],
        wait_for_response: bool,
    ) -> Result<Option<ControlReply>> {
        if !self.is_open() {
            return Err(EdgeError::ConnectionClosed);
        }

        let frame = OutboundFrame::control(command, body)?;
        let exchange = async {
            let mut control_rx = self.control_rx.lock().await;
            while let Ok(stale) = control_rx.try_recv() {
                tracing::warn!(len = stale.payload.len(), "discarding stale control frame");
            }

            self.writer.send(frame).await?;
            tracing::debug!(%command, "sent control command");

            if !wait_for_response {
                return Ok(None);
            }
            control_rx
                .recv()
                .await
                .map(Some)
                .ok_or(EdgeError::ConnectionClosed)
        };

        let frame = match tokio::time::timeout(self.config.control_timeout, exchange).await {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(EdgeError::Timeout {
                    operation: format!("reply to {}", command),
                    timeout: self.config.control_timeout,
                })
            }
        };

        match frame.control_command() {
            Ok((reply, body)) => {
                tracing::debug!(%command, %reply, "received control reply");
                Ok(Some(ControlReply {
                    command: reply,
                    body,
                }))
            }
            Err(e) => {
                tracing::warn!(%command, error = %e, "rejected control reply");
                Err(e)
            }
        }
    }

    /// Ids of calls still waiting for a response.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.pending.ids()
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Close the transport and reject every outstanding call.
    pub fn close(&self) {
        self.closed.cancel();
        let failed = self.pending.fail_all(|| EdgeError::ConnectionClosed);
        if failed > 0 {
            tracing::debug!(failed, "rejected pending calls on close");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Routes decoded frames to their channel.
struct Dispatcher {
    pending: Arc<PendingCalls>,
    writer: WriterHandle,
    control_tx: mpsc::Sender<Frame>,
    events: EventBus,
}

impl Dispatcher {
    fn dispatch(&self, frame: Frame) {
        match frame.kind {
            FrameKind::Control => {
                if self.control_tx.try_send(frame).is_err() {
                    tracing::warn!("control queue full, dropping control frame");
                }
            }
            FrameKind::Data => match Inbound::parse(frame.payload()) {
                Ok(Inbound::Response { id: Some(id), outcome }) => {
                    if !self.pending.resolve(id, outcome) {
                        tracing::warn!(id, "discarding response with unknown id");
                    }
                }
                Ok(Inbound::Response { id: None, .. }) => {
                    tracing::warn!("discarding response without numeric id");
                }
                Ok(Inbound::Request { id, method, params }) => {
                    self.handle_request(id, &method, &params);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed data frame");
                }
            },
        }
    }

    fn handle_request(&self, id: Option<Value>, method: &str, params: &Value) {
        let reply = if method == WRITE_METHOD {
            match ResourceEvent::from_write_params(params) {
                Ok(event) => {
                    let listeners = self.events.publish(&event);
                    tracing::debug!(
                        device_id = %event.device_id,
                        route = %event.route,
                        kind = ?event.kind,
                        listeners,
                        "dispatched push notification"
                    );
                    Ok(())
                }
                Err(e @ EdgeError::UnknownOperationCode(_)) => {
                    tracing::warn!(error = %e, "dropping write notification");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed write notification");
                    Err((INVALID_PARAMS, e.to_string()))
                }
            }
        } else {
            tracing::warn!(method, "unsupported inbound method");
            Err((METHOD_NOT_FOUND, format!("Method '{}' not found", method)))
        };

        let Some(id) = id else {
            return;
        };
        let response = match reply {
            Ok(()) => RpcResponse::ok(&id, json!("ok")),
            Err((code, message)) => RpcResponse::error(&id, code, message),
        };
        if let Err(e) = self.send_json(&response) {
            tracing::warn!(error = %e, "failed to answer gateway request");
        }
    }

    /// Queue a reply without waiting; the read loop never blocks on the writer.
    fn send_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let payload = JsonCodec::encode(value)?;
        self.writer.try_send(OutboundFrame::data(payload)?)
    }
}

/// Main read loop - reads chunks, reassembles frames, dispatches in order.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    dispatcher: &Dispatcher,
    closed: &CancellationToken,
    max_frame_size: u32,
) -> Result<()> {
    let mut frame_buffer = FrameBuffer::with_max_frame_size(max_frame_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = tokio::select! {
            _ = closed.cancelled() => return Ok(()),
            read = reader.read(&mut buf) => match read {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) => return Err(EdgeError::Io(e)),
            },
        };

        for frame in frame_buffer.push(&buf[..n])? {
            dispatcher.dispatch(frame);
        }
    }
}
