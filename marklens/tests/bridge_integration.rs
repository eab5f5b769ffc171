//! Bridge tests against the stub language server binary.

use std::time::Duration;

use marklens::bridge::{BridgeError, ConnectionState, LspClient};
use marklens::config::BridgeConfig;
use serde_json::json;
use tokio::sync::mpsc;

fn stub_config(workspace: &std::path::Path) -> BridgeConfig {
    BridgeConfig::new(workspace)
        .with_server_path(env!("CARGO_BIN_EXE_stub-lsp"))
        .with_args(Vec::new())
        .with_spawn_grace(Duration::from_millis(20))
        .with_handshake_timeout(Duration::from_secs(5))
        .with_call_timeout(Duration::from_secs(5))
        .with_shutdown_grace(Duration::from_secs(2))
}

async fn start_client() -> (tempfile::TempDir, LspClient) {
    let dir = tempfile::tempdir().unwrap();
    let client = LspClient::start(stub_config(dir.path())).await.unwrap();
    (dir, client)
}

#[tokio::test]
async fn startup_reaches_ready_and_reports_capabilities() {
    let (_dir, client) = start_client().await;

    assert_eq!(client.state(), ConnectionState::Ready);
    let caps = client.capabilities().unwrap();
    assert_eq!(caps["documentSymbolProvider"], true);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn echo_round_trips_params() {
    let (_dir, client) = start_client().await;

    let result = client
        .call("echo", Some(json!({"value": 42})))
        .await
        .unwrap();
    assert_eq!(result, json!({"value": 42}));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_resolve_to_their_own_callers() {
    let (_dir, client) = start_client().await;

    let (a, b, c) = tokio::join!(
        client.call("echo", Some(json!({"tag": "a"}))),
        client.call("echo", Some(json!({"tag": "b"}))),
        client.call("echo", Some(json!({"tag": "c"}))),
    );

    assert_eq!(a.unwrap()["tag"], "a");
    assert_eq!(b.unwrap()["tag"], "b");
    assert_eq!(c.unwrap()["tag"], "c");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_call_times_out_and_connection_stays_usable() {
    let (_dir, client) = start_client().await;

    let err = client
        .call_with_timeout(
            "sleep",
            Some(json!({"ms": 500})),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { .. }));

    // The late reply is discarded; subsequent calls are unaffected.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let result = client.call("echo", Some(json!({"ok": true}))).await.unwrap();
    assert_eq!(result["ok"], true);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_method_is_a_call_local_protocol_error() {
    let (_dir, client) = start_client().await;

    let err = client.call("no/such/method", None).await.unwrap_err();
    match err {
        BridgeError::Protocol { code, .. } => assert_eq!(code, -32601),
        other => panic!("expected protocol error, got {other}"),
    }

    // Protocol errors must not poison the connection.
    assert_eq!(client.state(), ConnectionState::Ready);
    client.call("echo", Some(json!({}))).await.unwrap();

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn server_crash_fails_pending_calls_and_terminates() {
    let (_dir, client) = start_client().await;

    let slow_a = client.call("sleep", Some(json!({"ms": 10000})));
    let slow_b = client.call("sleep", Some(json!({"ms": 10000})));
    let slow_c = client.call("sleep", Some(json!({"ms": 10000})));
    let crash = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.notify("crash", None).await
    };

    let (a, b, c, _) = tokio::join!(slow_a, slow_b, slow_c, crash);
    assert!(matches!(a.unwrap_err(), BridgeError::ConnectionClosed));
    assert!(matches!(b.unwrap_err(), BridgeError::ConnectionClosed));
    assert!(matches!(c.unwrap_err(), BridgeError::ConnectionClosed));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state(), ConnectionState::Terminated);
    assert!(matches!(
        client.call("echo", None).await.unwrap_err(),
        BridgeError::ProcessNotRunning
    ));
}

#[tokio::test]
async fn truncated_frame_surfaces_as_malformed_frame() {
    let (_dir, client) = start_client().await;

    // The stub writes a header declaring 512 bytes, delivers a fragment, and
    // closes its stdout; the pending call must fail on the framing violation.
    let err = client.call("truncate", None).await.unwrap_err();
    assert!(matches!(err, BridgeError::MalformedFrame(_)), "{err:?}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state(), ConnectionState::Terminated);
}

#[tokio::test]
async fn shutdown_is_clean_and_idempotent() {
    let (_dir, client) = start_client().await;

    client.shutdown().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Terminated);

    // Second shutdown is a no-op.
    client.shutdown().await.unwrap();

    assert!(matches!(
        client.call("echo", None).await.unwrap_err(),
        BridgeError::ProcessNotRunning
    ));
}

#[tokio::test]
async fn missing_server_binary_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_config(dir.path()).with_server_path("/nonexistent/marksman-stub");

    let err = LspClient::start(config).await.unwrap_err();
    assert!(matches!(err, BridgeError::Spawn(_)));
}

#[tokio::test]
async fn server_notifications_reach_the_registered_handler() {
    let (_dir, client) = start_client().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.set_notification_handler(tx);

    client.call("publish", None).await.unwrap();

    let notification = rx.recv().await.unwrap();
    assert_eq!(notification.method, "textDocument/publishDiagnostics");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn document_symbol_fixture_parses_into_symbols() {
    use marklens::symbols::SymbolSource;

    let (dir, client) = start_client().await;
    let doc = dir.path().join("doc.md");
    std::fs::write(&doc, "# Stub Title\n\n## Stub Section\n").unwrap();

    let symbols = SymbolSource::document_symbols(&client, &doc, "# Stub Title\n")
        .await
        .unwrap();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[0].name, "Stub Title");
    assert_eq!(symbols[1].depth, 1);

    client.shutdown().await.unwrap();
}
