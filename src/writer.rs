//! Dedicated writer task for outbound frames.
//!
//! Callers never touch the socket directly. Every frame is handed to a single
//! writer task through an mpsc channel, so concurrent calls cannot interleave
//! partial frame bytes on the transport.
//!
//! # Architecture
//!
//! ```text
//! call()         ─┐
//! call()         ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! control cmd    ─┤
//! push ack       ─┘
//! ```
//!
//! Frames that are ready together are batched into one vectored write.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{EdgeError, Result};
use crate::protocol::{ControlCommand, Frame, FrameHeader, FrameKind};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Pre-encoded header (4 or 8 bytes).
    pub header: FrameHeader,
    /// Payload bytes.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    ///
    /// # Errors
    ///
    /// Fails for an empty data payload or a payload above `u32::MAX` bytes.
    pub fn new(kind: FrameKind, payload: Bytes) -> Result<Self> {
        let length = u32::try_from(payload.len()).map_err(|_| EdgeError::FrameTooLarge {
            length: u32::MAX,
            max: u32::MAX,
        })?;
        Ok(Self {
            header: FrameHeader::new(kind, length)?,
            payload,
        })
    }

    /// Data frame carrying JSON-RPC text.
    pub fn data(payload: Bytes) -> Result<Self> {
        Self::new(FrameKind::Data, payload)
    }

    /// Control frame carrying `command` followed by `body`.
    pub fn control(command: ControlCommand, body: &[u8]) -> Result<Self> {
        let frame = Frame::control(command, body);
        Self::new(FrameKind::Control, frame.payload)
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.header.len() + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable and can be shared across callers.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// Waits while the channel is full.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| EdgeError::ConnectionClosed)
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `WriterBusy` when the channel is full.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EdgeError::WriterBusy,
            mpsc::error::TrySendError::Closed(_) => EdgeError::ConnectionClosed,
        })
    }

    /// Check whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends when every handle is dropped or a write fails.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                let _ = writer.shutdown().await;
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!(error = %e, frames = batch.len(), "frame write failed");
            return Err(e);
        }
        tracing::trace!(frames = batch.len(), "wrote frame batch");
    }
}

/// Write a batch of frames using vectored writes, continuing after partial
/// writes until every byte is out.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        if slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(EdgeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data remaining after `skip_bytes`.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [frame.header.as_bytes(), &frame.payload[..]] {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameBuffer, CONTROL_HEADER_SIZE, DATA_HEADER_SIZE};
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_outbound_frame_sizes() {
        let data = OutboundFrame::data(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(data.size(), DATA_HEADER_SIZE + 5);

        let control = OutboundFrame::control(ControlCommand::Ready, b"").unwrap();
        assert_eq!(control.size(), CONTROL_HEADER_SIZE + 4);
    }

    #[test]
    fn test_empty_data_frame_rejected() {
        assert!(matches!(
            OutboundFrame::data(Bytes::new()),
            Err(EdgeError::EmptyDataFrame)
        ));
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![OutboundFrame::data(Bytes::from_static(b"hello")).unwrap()];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![OutboundFrame::control(ControlCommand::Stop, b"").unwrap()];
        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), CONTROL_HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 4);
    }

    #[test]
    fn test_build_remaining_slices_across_frames() {
        let batch = vec![
            OutboundFrame::data(Bytes::from_static(b"abc")).unwrap(),
            OutboundFrame::data(Bytes::from_static(b"defg")).unwrap(),
        ];
        let slices = build_remaining_slices(&batch, DATA_HEADER_SIZE + 3 + 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), DATA_HEADER_SIZE - 2);
        assert_eq!(slices[1].len(), 4);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5)
            .map(|_| OutboundFrame::data(Bytes::from_static(b"abc")).unwrap())
            .collect();

        write_batch(&mut buf, &batch).await.unwrap();

        let written = buf.into_inner();
        assert_eq!(written.len(), 5 * (DATA_HEADER_SIZE + 3));
    }

    #[tokio::test]
    async fn test_concurrent_senders_never_interleave() {
        let (client, mut server) = duplex(64);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let payload = Bytes::from(vec![b'a' + i; 300]);
                handle
                    .send(OutboundFrame::data(payload).unwrap())
                    .await
                    .unwrap();
            }));
        }

        let reader = tokio::spawn(async move {
            let mut buffer = FrameBuffer::new();
            let mut frames = Vec::new();
            let mut chunk = [0u8; 97];
            while frames.len() < 8 {
                let n = server.read(&mut chunk).await.unwrap();
                frames.extend(buffer.push(&chunk[..n]).unwrap());
            }
            frames
        });

        for task in tasks {
            task.await.unwrap();
        }
        let frames = reader.await.unwrap();

        assert_eq!(frames.len(), 8);
        for frame in frames {
            let first = frame.payload()[0];
            assert_eq!(frame.payload().len(), 300);
            assert!(frame.payload().iter().all(|&b| b == first));
        }
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
