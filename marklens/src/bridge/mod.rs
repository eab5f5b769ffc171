//! LSP bridge: everything between the analyzer and the `marksman` process.
//!
//! # Architecture
//!
//! - **protocol**: JSON-RPC 2.0 message types (Request/Response/Notification)
//! - **codec**: Content-Length framing over the server's stdio pipes
//! - **supervisor**: child process spawn, liveness, and termination
//! - **dispatch**: request-id allocation and pending-call completion
//! - **state**: connection lifecycle state machine
//! - **client**: the I/O loop tying the above together

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod state;
pub mod supervisor;

pub use client::LspClient;
pub use error::BridgeError;
pub use state::ConnectionState;
