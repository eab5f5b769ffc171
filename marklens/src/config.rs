//! Configuration for the LSP bridge and the analyzer.

use std::path::PathBuf;
use std::time::Duration;

/// Launch and timing parameters for the language-server connection.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Executable name or path, resolved through PATH by the OS.
    pub server_path: String,
    /// Arguments selecting server mode. Marksman speaks LSP under its
    /// `server` subcommand.
    pub args: Vec<String>,
    /// Working directory for the server; doubles as the workspace root sent
    /// in the `initialize` request.
    pub workspace_root: PathBuf,
    /// How long to wait after spawn before concluding the process survived.
    pub spawn_grace: Duration,
    /// Deadline for the `initialize` round trip.
    pub handshake_timeout: Duration,
    /// Default per-call deadline.
    pub call_timeout: Duration,
    /// How long to wait for the process to exit after `shutdown`/`exit`
    /// before force-killing it.
    pub shutdown_grace: Duration,
}

impl BridgeConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            server_path: "marksman".to_string(),
            args: vec!["server".to_string()],
            workspace_root: workspace_root.into(),
            spawn_grace: Duration::from_millis(150),
            handshake_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    pub fn with_server_path(mut self, path: impl Into<String>) -> Self {
        self.server_path = path.into();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_spawn_grace(mut self, grace: Duration) -> Self {
        self.spawn_grace = grace;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Analyzer options on top of the bridge.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub bridge: BridgeConfig,
    /// Skip the language server entirely; analyses carry no symbols.
    pub without_lsp: bool,
}

impl AnalyzerConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            bridge: BridgeConfig::new(workspace_root),
            without_lsp: false,
        }
    }

    pub fn with_bridge(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn without_lsp(mut self) -> Self {
        self.without_lsp = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_marksman_server_mode() {
        let config = BridgeConfig::new("/tmp/ws");
        assert_eq!(config.server_path, "marksman");
        assert_eq!(config.args, vec!["server".to_string()]);
        assert_eq!(config.call_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = BridgeConfig::new(".")
            .with_server_path("/opt/bin/marksman")
            .with_call_timeout(Duration::from_secs(2));
        assert_eq!(config.server_path, "/opt/bin/marksman");
        assert_eq!(config.call_timeout, Duration::from_secs(2));
    }
}
