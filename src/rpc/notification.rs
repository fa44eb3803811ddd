//! Push notifications from the gateway.
//!
//! The gateway reports resource writes and executions by calling `write`
//! on the translator:
//!
//! ```text
//! {"method":"write","params":{
//!     "uri":{"deviceId":"dev","objectId":3200,"objectInstanceId":0,"resourceId":5501},
//!     "operation":2,
//!     "value":"AAAAFA=="}}
//! ```
//!
//! Operation 2 is a value update, 4 is an execute; anything else is dropped.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::codec::ValueCodec;
use crate::error::{EdgeError, Result};
use crate::resource::RoutePath;

/// Method name of push notifications.
pub const WRITE_METHOD: &str = "write";

/// Operation code for a value update.
pub const OPERATION_UPDATED: i64 = 2;

/// Operation code for an execute.
pub const OPERATION_EXECUTED: i64 = 4;

/// What happened to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The gateway wrote a new value.
    Updated,
    /// The gateway executed the resource.
    Executed,
}

impl EventKind {
    /// Map a notification operation code.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperationCode` for codes other than 2 and 4.
    pub fn from_operation(code: i64) -> Result<Self> {
        match code {
            OPERATION_UPDATED => Ok(EventKind::Updated),
            OPERATION_EXECUTED => Ok(EventKind::Executed),
            other => Err(EdgeError::UnknownOperationCode(other)),
        }
    }
}

/// A decoded push notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    /// Device the resource belongs to.
    pub device_id: String,
    /// Resource address.
    pub route: RoutePath,
    /// Update or execute.
    pub kind: EventKind,
    /// Raw value bytes (base64 already decoded).
    pub value: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteUri {
    #[serde(alias = "device-id")]
    device_id: String,
    #[serde(alias = "object-id")]
    object_id: u32,
    #[serde(alias = "object-instance-id")]
    object_instance_id: u32,
    #[serde(alias = "resource-id")]
    resource_id: u32,
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    uri: WriteUri,
    operation: i64,
    #[serde(default)]
    value: String,
}

impl ResourceEvent {
    /// Decode the params of a `write` notification.
    ///
    /// # Errors
    ///
    /// - `Json` if the params do not have the notification shape
    /// - `InvalidValue` if the value is not base64
    /// - `UnknownOperationCode` for operations other than 2 and 4
    pub fn from_write_params(params: &Value) -> Result<Self> {
        let params = WriteParams::deserialize(params)?;
        let kind = EventKind::from_operation(params.operation)?;
        let value = ValueCodec::from_base64(&params.value)?;

        Ok(Self {
            device_id: params.uri.device_id,
            route: RoutePath::new(
                params.uri.object_id,
                params.uri.object_instance_id,
                params.uri.resource_id,
            ),
            kind,
            value,
        })
    }
}
