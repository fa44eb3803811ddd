//! Control-frame handshakes.
//!
//! Opening a session:
//!
//! ```text
//! client                         gateway
//!   │── READY ──────────────────────►│
//!   │◄───────────── ACCEPT + body ───│
//!   │── START + body ───────────────►│   (no reply)
//!   │   ... start grace ...          │
//! ```
//!
//! Closing a session is a single STOP / FINISH exchange.

use std::time::Duration;

use crate::connection::{Connection, ControlReply};
use crate::error::{EdgeError, Result};
use crate::protocol::ControlCommand;

/// Default pause after START before the connection is used.
pub const DEFAULT_START_GRACE: Duration = Duration::from_millis(200);

/// Run READY / ACCEPT / START on a fresh connection.
///
/// START carries ACCEPT's trailing bytes behind its own command code. The
/// gateway does not answer START, so the handshake waits `start_grace`
/// before the connection carries any RPC traffic.
///
/// # Errors
///
/// Returns `ProtocolViolation` if the gateway answers READY with anything
/// but ACCEPT.
pub async fn open_handshake(conn: &Connection, start_grace: Duration) -> Result<()> {
    let accept = expect_reply(conn, ControlCommand::Ready, ControlCommand::Accept).await?;

    conn.send_control_command(ControlCommand::Start, &accept.body, false)
        .await?;
    tokio::time::sleep(start_grace).await;

    tracing::debug!(echoed = accept.body.len(), "handshake complete");
    Ok(())
}

/// Run STOP / FINISH.
///
/// # Errors
///
/// Returns `ProtocolViolation` if the gateway answers STOP with anything
/// but FINISH.
pub async fn close_handshake(conn: &Connection) -> Result<()> {
    expect_reply(conn, ControlCommand::Stop, ControlCommand::Finish).await?;
    Ok(())
}

async fn expect_reply(
    conn: &Connection,
    command: ControlCommand,
    expected: ControlCommand,
) -> Result<ControlReply> {
    let reply = conn
        .send_control_command(command, &[], true)
        .await?
        .ok_or_else(|| EdgeError::ProtocolViolation(format!("no reply to {}", command)))?;

    if reply.command != expected {
        tracing::warn!(%command, %expected, actual = %reply.command, "unexpected control reply");
        return Err(EdgeError::ProtocolViolation(format!(
            "expected {} in reply to {}, got {}",
            expected, command, reply.command
        )));
    }
    Ok(reply)
}
