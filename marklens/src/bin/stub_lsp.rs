//! Scriptable stand-in for a real language server, used by the integration
//! tests. Speaks Content-Length framed JSON-RPC over stdio.
//!
//! Beyond the standard lifecycle methods it understands a few test hooks:
//! `echo` (returns its params), `sleep` (delays the reply off-thread),
//! `crash` (exits without replying), `publish` (pushes a notification
//! before replying), and `truncate` (emits a partial frame and exits).

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

fn main() {
    let stdout = Arc::new(Mutex::new(std::io::stdout()));
    let mut stdin = std::io::stdin().lock();

    loop {
        let msg = match read_frame(&mut stdin) {
            Some(msg) => msg,
            None => std::process::exit(0),
        };
        handle(msg, &stdout);
    }
}

fn handle(msg: Value, stdout: &Arc<Mutex<std::io::Stdout>>) {
    let method = msg.get("method").and_then(Value::as_str).map(str::to_string);
    let id = msg.get("id").cloned();
    let params = msg.get("params").cloned().unwrap_or(Value::Null);

    let Some(method) = method else {
        // Responses from the client are ignored.
        return;
    };

    match (method.as_str(), id) {
        ("initialize", Some(id)) => {
            respond(stdout, &id, json!({
                "capabilities": {
                    "documentSymbolProvider": true,
                    "textDocumentSync": 1,
                }
            }));
        }
        ("shutdown", Some(id)) => respond(stdout, &id, Value::Null),
        ("echo", Some(id)) => respond(stdout, &id, params),
        ("sleep", Some(id)) => {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(1000);
            let stdout = Arc::clone(stdout);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(ms));
                respond(&stdout, &id, json!({"slept": ms}));
            });
        }
        ("crash", _) => std::process::exit(1),
        ("truncate", _) => {
            // Declares more bytes than it delivers, then closes the stream.
            let Ok(mut out) = stdout.lock() else {
                std::process::exit(1);
            };
            let _ = out.write_all(b"Content-Length: 512\r\n\r\n{\"jsonrpc\"");
            let _ = out.flush();
            std::process::exit(0);
        }
        ("publish", Some(id)) => {
            send(stdout, &json!({
                "jsonrpc": "2.0",
                "method": "textDocument/publishDiagnostics",
                "params": {"uri": "file:///stub.md", "diagnostics": []},
            }));
            respond(stdout, &id, Value::Null);
        }
        ("textDocument/documentSymbol", Some(id)) => {
            respond(stdout, &id, json!([
                {
                    "name": "Stub Title",
                    "kind": 15,
                    "range": {"start": {"line": 0, "character": 0}, "end": {"line": 8, "character": 0}},
                    "selectionRange": {"start": {"line": 0, "character": 2}, "end": {"line": 0, "character": 12}},
                    "children": [
                        {
                            "name": "Stub Section",
                            "kind": 15,
                            "range": {"start": {"line": 2, "character": 0}, "end": {"line": 8, "character": 0}},
                            "selectionRange": {"start": {"line": 2, "character": 3}, "end": {"line": 2, "character": 15}}
                        }
                    ]
                }
            ]));
        }
        ("exit", None) => std::process::exit(0),
        ("initialized" | "textDocument/didOpen", None) => {}
        (_, Some(id)) => {
            send(stdout, &json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method not found: {method}")},
            }));
        }
        (_, None) => {}
    }
}

fn respond(stdout: &Arc<Mutex<std::io::Stdout>>, id: &Value, result: Value) {
    send(stdout, &json!({"jsonrpc": "2.0", "id": id, "result": result}));
}

fn send(stdout: &Arc<Mutex<std::io::Stdout>>, msg: &Value) {
    let body = msg.to_string();
    let Ok(mut out) = stdout.lock() else {
        std::process::exit(1);
    };
    let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
    if out.write_all(frame.as_bytes()).is_err() || out.flush().is_err() {
        std::process::exit(1);
    }
}

/// Read one framed message; `None` on a closed or unparseable stream.
fn read_frame(stdin: &mut impl Read) -> Option<Value> {
    let mut header = Vec::new();
    let mut byte = [0u8; 1];

    while !header.ends_with(b"\r\n\r\n") {
        match stdin.read(&mut byte) {
            Ok(1) => header.push(byte[0]),
            _ => return None,
        }
    }

    let header = String::from_utf8(header).ok()?;
    let length: usize = header
        .split("\r\n")
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim().eq_ignore_ascii_case("content-length").then(|| value.trim())
        })?
        .parse()
        .ok()?;

    let mut body = vec![0u8; length];
    stdin.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}
