//! Transport module - byte-stream connection to the gateway.
//!
//! Provides abstraction over:
//! - TCP (`host:port`)
//! - Unix Domain Sockets (Linux/macOS)

mod stream;

pub use stream::{connect, EdgeStream, Endpoint};
