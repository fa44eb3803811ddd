//! Control plane - handshakes carried in control frames.
//!
//! Control frames share the transport with JSON-RPC data frames but are
//! routed to their own queue by the connection's read loop, so a handshake
//! reply can never be consumed as an RPC response or vice versa.
//!
//! # Workflow
//!
//! 1. Client connects to the gateway
//! 2. READY / ACCEPT / START ([`open_handshake`])
//! 3. `protocol_translator_register` over the data plane
//! 4. Steady-state RPC and push notifications
//! 5. STOP / FINISH ([`close_handshake`])

mod handshake;

pub use handshake::{close_handshake, open_handshake, DEFAULT_START_GRACE};
