//! RPC correlation layer.
//!
//! Two logical channels share one transport:
//! - request/response, keyed by call id ([`PendingCalls`])
//! - push notifications, keyed by method name and fanned out to scoped
//!   listeners ([`EventBus`])

mod events;
mod message;
mod notification;
mod pending;

pub use events::{EventBus, EventScope, Listener, Subscription};
pub use message::{Inbound, RpcErrorObject, RpcRequest, RpcResponse, JSONRPC_VERSION, METHOD_NOT_FOUND};
pub use notification::{
    EventKind, ResourceEvent, OPERATION_EXECUTED, OPERATION_UPDATED, WRITE_METHOD,
};
pub use pending::{PendingCalls, PendingRequest};
