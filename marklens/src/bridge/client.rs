//! LSP client: spawns the server, owns the I/O loop, and exposes
//! `call`/`notify` to the rest of the system.
//!
//! Architecture:
//! - one writer task drains an mpsc queue into `FramedWrite<ChildStdin>`, so
//!   concurrent callers never interleave frames;
//! - one reader task is the sole consumer of `FramedRead<ChildStdout>` and
//!   routes responses into the pending-call table;
//! - one monitor task sweeps process liveness and tears the connection down
//!   on unexpected exit.
//!
//! Callers just await their own completion slot; all I/O happens off their
//! task.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::FrameCodec;
use super::dispatch::RequestDispatcher;
use super::error::BridgeError;
use super::protocol::{Message, Notification};
use super::state::{ConnectionState, StateCell};
use super::supervisor::ServerProcess;
use crate::config::BridgeConfig;

/// Liveness sweep interval for the monitor task.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared between caller tasks and the I/O tasks. Locks are held only
/// for field updates, never across reads or writes.
#[derive(Debug)]
struct Shared {
    state: StateCell,
    dispatcher: RequestDispatcher,
    notifications: StdMutex<Option<mpsc::UnboundedSender<Notification>>>,
}

impl Shared {
    /// Terminal teardown: runs exactly once, synchronously failing every
    /// pending call with the given error.
    fn teardown(&self, error: BridgeError) {
        if self.state.terminate() {
            let failed = self.dispatcher.fail_all(&error);
            tracing::info!(failed_calls = failed, error = %error, "Connection terminated");
        }
    }

    fn forward_notification(&self, n: Notification) {
        let guard = self.notifications.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(n).is_err() {
                    tracing::debug!("Notification receiver dropped");
                }
            }
            None => tracing::debug!("Ignoring server notification (no handler registered)"),
        }
    }
}

#[derive(Debug)]
pub struct LspClient {
    config: BridgeConfig,
    process: Arc<tokio::sync::Mutex<ServerProcess>>,
    shared: Arc<Shared>,
    writer_tx: mpsc::Sender<Message>,
    capabilities: StdMutex<Option<serde_json::Value>>,
}

impl LspClient {
    /// Spawn the server and run the full startup sequence:
    /// spawn → grace poll → `initialize` → `initialized` → `Ready`.
    ///
    /// Every failure path lands in `Terminated`; the returned error tells the
    /// caller why.
    pub async fn start(config: BridgeConfig) -> Result<Self, BridgeError> {
        let shared = Arc::new(Shared {
            state: StateCell::new(),
            dispatcher: RequestDispatcher::new(),
            notifications: StdMutex::new(None),
        });

        let _ = shared
            .state
            .transition(ConnectionState::Uninitialized, ConnectionState::Starting);

        let mut process = match ServerProcess::spawn(&config).await {
            Ok(p) => p,
            Err(e) => {
                shared.teardown(BridgeError::ProcessNotRunning);
                return Err(e);
            }
        };

        let stdin = process
            .take_stdin()
            .ok_or_else(|| BridgeError::Spawn("stdin not captured".to_string()))?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| BridgeError::Spawn("stdout not captured".to_string()))?;

        let _ = shared
            .state
            .transition(ConnectionState::Starting, ConnectionState::Handshaking);

        let (writer_tx, writer_rx) = mpsc::channel::<Message>(64);
        let process = Arc::new(tokio::sync::Mutex::new(process));

        tokio::spawn(writer_task(
            FramedWrite::new(stdin, FrameCodec::new()),
            writer_rx,
            Arc::clone(&shared),
        ));
        tokio::spawn(reader_task(
            FramedRead::new(stdout, FrameCodec::new()),
            Arc::clone(&shared),
            writer_tx.clone(),
        ));
        tokio::spawn(monitor_task(Arc::clone(&process), Arc::clone(&shared)));

        let client = Self {
            config,
            process,
            shared,
            writer_tx,
            capabilities: StdMutex::new(None),
        };

        match client.handshake().await {
            Ok(()) => Ok(client),
            Err(e) => {
                tracing::error!(error = %e, "Handshake failed, terminating server");
                client.shared.teardown(BridgeError::ConnectionClosed);
                client
                    .process
                    .lock()
                    .await
                    .terminate(Duration::from_secs(1))
                    .await;
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<(), BridgeError> {
        let root_uri = file_uri(&self.config.workspace_root);

        let params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "hover": {"contentFormat": ["markdown", "plaintext"]},
                    "completion": {"completionItem": {"snippetSupport": true}},
                    "definition": {},
                    "references": {},
                    "documentSymbol": {},
                    "publishDiagnostics": {},
                },
                "workspace": {
                    "didChangeWatchedFiles": {"dynamicRegistration": true},
                    "workspaceFolders": true,
                },
            },
            "initializationOptions": {},
            "workspaceFolders": [{"uri": root_uri, "name": "workspace"}],
        });

        let result = self
            .call_unchecked("initialize", Some(params), self.config.handshake_timeout)
            .await?;

        *self
            .capabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = result.get("capabilities").cloned();

        self.notify_unchecked("initialized", Some(serde_json::json!({})))
            .await?;

        self.shared
            .state
            .transition(ConnectionState::Handshaking, ConnectionState::Ready)
            .map_err(|observed| {
                tracing::warn!(state = %observed, "Connection left handshaking state mid-handshake");
                BridgeError::ConnectionClosed
            })?;

        tracing::info!("Language server ready");
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.is_ready()
    }

    /// Server capabilities advertised in the `initialize` result.
    pub fn capabilities(&self) -> Option<serde_json::Value> {
        self.capabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Register the receiver for server-pushed notifications (diagnostics
    /// and friends). Unrouted notifications are dropped at debug level.
    pub fn set_notification_handler(&self, tx: mpsc::UnboundedSender<Notification>) {
        *self
            .shared
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    /// Synchronous-looking request with the default deadline.
    ///
    /// Calls issued before the handshake completes are rejected with
    /// `ProcessNotRunning` rather than queued.
    pub async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, BridgeError> {
        self.call_with_timeout(method, params, self.config.call_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        if !self.shared.state.is_ready() {
            return Err(BridgeError::ProcessNotRunning);
        }
        self.call_unchecked(method, params, timeout).await
    }

    /// Fire-and-forget notification. No id, no pending entry.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), BridgeError> {
        if !self.shared.state.is_ready() {
            return Err(BridgeError::ProcessNotRunning);
        }
        self.notify_unchecked(method, params).await
    }

    /// Request path without the `Ready` gate; used by the handshake and
    /// shutdown sequences which legitimately run outside `Ready`.
    async fn call_unchecked(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        if self.shared.state.get() == ConnectionState::Terminated {
            return Err(BridgeError::ProcessNotRunning);
        }

        let (id, rx) = self.shared.dispatcher.register();
        tracing::debug!(id, method, "Sending request");

        if self
            .writer_tx
            .send(Message::request(id, method, params))
            .await
            .is_err()
        {
            self.shared.dispatcher.discard(id);
            return Err(BridgeError::ConnectionClosed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            // Sender dropped without a reply: teardown raced our registration.
            Ok(Err(_)) => Err(BridgeError::ConnectionClosed),
            Err(_) => {
                self.shared.dispatcher.discard(id);
                tracing::warn!(id, method, ?timeout, "Request timed out");
                Err(BridgeError::Timeout {
                    method: method.to_string(),
                    after: timeout,
                })
            }
        }
    }

    async fn notify_unchecked(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), BridgeError> {
        if self.shared.state.get() == ConnectionState::Terminated {
            return Err(BridgeError::ProcessNotRunning);
        }
        self.writer_tx
            .send(Message::notification(method, params))
            .await
            .map_err(|_| BridgeError::ConnectionClosed)
    }

    /// Graceful stop: `shutdown` request, `exit` notification, then wait for
    /// the process within the configured grace period before force-killing.
    /// Idempotent; safe to call from any state.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        match self
            .shared
            .state
            .transition(ConnectionState::Ready, ConnectionState::ShuttingDown)
        {
            Ok(()) => {
                if let Err(e) = self
                    .call_unchecked("shutdown", None, self.config.call_timeout)
                    .await
                {
                    tracing::warn!(error = %e, "Shutdown request failed");
                }
                let _ = self.notify_unchecked("exit", None).await;
            }
            Err(ConnectionState::Terminated) => return Ok(()),
            Err(observed) => {
                tracing::debug!(state = %observed, "Shutdown requested outside ready state");
            }
        }

        {
            let mut process = self.process.lock().await;
            if !process.wait_exit(self.config.shutdown_grace).await {
                tracing::warn!("Server did not exit after shutdown sequence");
                process.terminate(Duration::from_secs(1)).await;
            }
        }

        self.shared.teardown(BridgeError::ConnectionClosed);
        Ok(())
    }

    // Document-level conveniences used by the analyzer.

    /// `textDocument/didOpen` for a markdown file.
    pub async fn open_document(&self, path: &std::path::Path, text: &str) -> Result<(), BridgeError> {
        let params = serde_json::json!({
            "textDocument": {
                "uri": file_uri(path),
                "languageId": "markdown",
                "version": 1,
                "text": text,
            }
        });
        self.notify("textDocument/didOpen", Some(params)).await
    }

    /// `textDocument/documentSymbol`; returns the raw result payload.
    pub async fn document_symbols(
        &self,
        path: &std::path::Path,
    ) -> Result<serde_json::Value, BridgeError> {
        let params = serde_json::json!({
            "textDocument": {"uri": file_uri(path)}
        });
        self.call("textDocument/documentSymbol", Some(params)).await
    }
}

/// `file://` URI for an absolute (canonicalized when possible) path, with
/// reserved characters percent-encoded.
pub fn file_uri(path: &std::path::Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    match url::Url::from_file_path(&absolute) {
        Ok(url) => url.to_string(),
        // from_file_path only fails on paths with no absolute form; keep the
        // raw rendering rather than refusing the document.
        Err(()) => format!("file://{}", absolute.display()),
    }
}

async fn writer_task(
    mut writer: FramedWrite<tokio::process::ChildStdin, FrameCodec>,
    mut rx: mpsc::Receiver<Message>,
    shared: Arc<Shared>,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(msg).await {
            tracing::error!(error = %e, "Failed to write to language server");
            shared.teardown(BridgeError::ConnectionClosed);
            break;
        }
    }
    tracing::trace!("Writer task exiting");
}

async fn reader_task(
    mut reader: FramedRead<tokio::process::ChildStdout, FrameCodec>,
    shared: Arc<Shared>,
    writer_tx: mpsc::Sender<Message>,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Response(resp)) => match resp.id.as_number() {
                Some(id) => {
                    let reply = match resp.error {
                        Some(err) => {
                            tracing::debug!(id, code = err.code, "Server returned error");
                            Err(BridgeError::Protocol {
                                code: err.code,
                                message: err.message,
                            })
                        }
                        None => Ok(resp.result.unwrap_or(serde_json::Value::Null)),
                    };
                    shared.dispatcher.resolve(id, reply);
                }
                None => {
                    tracing::debug!(id = %resp.id, "Dropping response with non-numeric id");
                }
            },
            Ok(Message::Notification(n)) => {
                tracing::trace!(method = %n.method, "Server notification");
                shared.forward_notification(n);
            }
            Ok(Message::Request(req)) => {
                // Bidirectional requests (capability registration etc.) are
                // declined rather than left dangling on the server side.
                tracing::debug!(method = %req.method, "Declining server-to-client request");
                let reply = Message::method_not_found(req.id, &req.method);
                if writer_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::error!(error = %e, "Framing error, terminating connection");
                shared.teardown(BridgeError::MalformedFrame(e.to_string()));
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Read error on server stdout");
                shared.teardown(BridgeError::ConnectionClosed);
                return;
            }
        }
    }

    tracing::debug!("Server closed its stdout");
    shared.teardown(BridgeError::ConnectionClosed);
}

/// Periodic liveness sweep. The reader usually notices death first via EOF;
/// this catches the process dying with its pipes held open.
async fn monitor_task(
    process: Arc<tokio::sync::Mutex<ServerProcess>>,
    shared: Arc<Shared>,
) {
    loop {
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;

        if shared.state.get() == ConnectionState::Terminated {
            return;
        }

        let exited = {
            let mut proc = process.lock().await;
            proc.poll_exit()
        };
        if let Some(status) = exited {
            tracing::warn!(?status, "Language server exited unexpectedly");
            shared.teardown(BridgeError::ConnectionClosed);
            return;
        }
    }
}
