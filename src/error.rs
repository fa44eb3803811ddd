//! Error types for edge-pt-client.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for all protocol translator operations.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The gateway refused the connection attempt.
    #[error("Connection refused by {endpoint}")]
    ConnectionRefused {
        /// Endpoint that refused.
        endpoint: String,
    },

    /// Handshake reply did not carry the expected control command.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A call or control exchange did not complete in time.
    #[error("Timeout after {timeout:?} waiting for {operation}")]
    Timeout {
        /// Method name or control command that timed out.
        operation: String,
        /// Configured interval.
        timeout: Duration,
    },

    /// Route is not of the form `<uint>/<uint>/<uint>`.
    #[error("Invalid route format '{0}', expected e.g. \"3200/0/5501\"")]
    InvalidRouteFormat(String),

    /// Resource created without a value.
    #[error("Value is required for route {0}")]
    MissingValue(String),

    /// Frame header length disagrees with the bytes it carries.
    #[error("Length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch {
        /// Length declared in the frame header.
        declared: usize,
        /// Length actually available.
        actual: usize,
    },

    /// Push notification carried an operation code other than 2 or 4.
    #[error("Unknown write operation code {0}")]
    UnknownOperationCode(i64),

    /// Raw bytes do not decode to a value of the route's kind.
    #[error("Invalid {kind} value: {reason}")]
    InvalidValue {
        /// Wire type of the route.
        kind: &'static str,
        /// What is wrong with the bytes.
        reason: String,
    },

    /// Frame header declares a payload above the configured maximum.
    #[error("Frame size {length} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared payload length.
        length: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Data frames must carry at least one byte.
    #[error("Data frame payload must not be empty")]
    EmptyDataFrame,

    /// Route is not registered on this device.
    #[error("Unknown route '{0}'")]
    UnknownRoute(String),

    /// Route is already registered on this device.
    #[error("Route '{0}' is already registered")]
    DuplicateRoute(String),

    /// Function routes have no value.
    #[error("Route '{0}' is a function, cannot set value")]
    FunctionRoute(String),

    /// Value variant does not match the route kind.
    #[error("Route '{route}' holds {expected} values, got {actual}")]
    KindMismatch {
        /// Route key.
        route: String,
        /// Kind the route was created with.
        expected: &'static str,
        /// Kind of the supplied value.
        actual: &'static str,
    },

    /// Operations bitmask is out of range or inconsistent with the kind.
    #[error("Invalid operations {operations:#04x} for route '{route}': {reason}")]
    InvalidOperations {
        /// Route key.
        route: String,
        /// Supplied bitmask.
        operations: u8,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Gateway answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Operation requires an open session.
    #[error("Session is not open (state: {0:?})")]
    NotOpen(SessionState),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound frame queue is full.
    #[error("Writer queue full")]
    WriterBusy,

    /// Connect loop was stopped by `deinit`.
    #[error("Cancelled")]
    Cancelled,
}

impl EdgeError {
    /// Errors that should be retried with the reconnect backoff.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, EdgeError::ConnectionRefused { .. } | EdgeError::Io(_))
    }
}

/// Result type alias using EdgeError.
pub type Result<T> = std::result::Result<T, EdgeError>;
