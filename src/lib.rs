//! # edge-pt-client
//!
//! Protocol translator client for an edge gateway.
//!
//! A translator bridges devices the gateway cannot talk to directly into the
//! gateway's device registry. Each device is a tree of LwM2M-style
//! object / instance / resource routes with typed values.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): length-prefixed data frames carrying
//!   JSON-RPC, and zero-prefixed control frames carrying handshake commands
//! - **RPC** ([`rpc`], [`connection`]): request/response correlation by id,
//!   plus push notifications fanned out to scoped listeners
//! - **Session** ([`session`]): connect, handshake, register, reconnect
//! - **Resources** ([`resource`]): devices, routes and the object model
//!
//! ## Example
//!
//! ```ignore
//! use edge_pt_client::{Session, ResourceValue};
//!
//! #[tokio::main]
//! async fn main() -> edge_pt_client::Result<()> {
//!     let session = Session::builder("unix:///tmp/edge.sock".parse()?, "my-translator").build();
//!     session.init().await?;
//!
//!     let device = session.device("lamp-1");
//!     device.create_int("3311/0/5851", 80)?;
//!     device.create_function("3311/0/5850", |payload| {
//!         tracing::info!(len = payload.len(), "toggle");
//!     })?;
//!     device.register().await?;
//!
//!     device.set_value("3311/0/5851", ResourceValue::Int(40)).await?;
//!
//!     device.unregister().await?;
//!     session.deinit().await
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod control;
pub mod error;
pub mod protocol;
pub mod resource;
pub mod rpc;
pub mod session;
pub mod transport;
pub mod writer;

pub use error::{EdgeError, Result};
pub use resource::{Device, Operations, ResourceKind, ResourceOptions, ResourceValue, RoutePath};
pub use session::{Session, SessionBuilder, SessionState};
pub use transport::Endpoint;
