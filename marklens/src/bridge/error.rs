//! Error taxonomy for the LSP bridge.

use std::time::Duration;

/// Failures surfaced by the bridge.
///
/// Connection-fatal variants (`Spawn`, `MalformedFrame`, `ConnectionClosed`)
/// terminate the connection and fail every pending call. `Timeout` and
/// `Protocol` are local to a single call; the connection remains usable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Executable missing, failed to launch, or exited during the grace poll.
    #[error("failed to spawn language server: {0}")]
    Spawn(String),

    /// Operation attempted while the server process is not in a usable state.
    #[error("language server is not running")]
    ProcessNotRunning,

    /// Framing or JSON decode failure. The byte stream cannot be resynchronized
    /// after this, so the connection is torn down.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The server returned a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// No response arrived before the deadline. The entry is discarded and a
    /// late response for this id is dropped silently.
    #[error("request {method:?} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The process exited or shutdown completed while the call was pending.
    #[error("connection to language server closed")]
    ConnectionClosed,
}

impl BridgeError {
    /// True for failures that tear down the whole connection rather than a
    /// single call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_) | Self::MalformedFrame(_) | Self::ConnectionClosed
        )
    }
}
