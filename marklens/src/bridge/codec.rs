//! Content-Length framed codec for language-server stdio streams.
//!
//! LSP delimits messages with a MIME-style header block:
//! ```text
//! Content-Length: 123\r\n
//! \r\n
//! <JSON payload, exactly 123 bytes>
//! ```
//! Works over any AsyncRead/AsyncWrite via FramedRead/FramedWrite.

use std::io;

use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::Message;

/// Upper bound on a declared body length. A corrupt header must not commit
/// the reader to an unbounded allocation.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Codec that frames [`Message`]s with a `Content-Length` header.
///
/// Decoding remembers the declared body length across calls, so partial
/// delivery of either the header block or the body returns `Ok(None)` until
/// enough bytes arrive. Any framing violation is an `InvalidData` error; the
/// stream cannot be resynchronized afterwards.
#[derive(Debug, Default)]
pub struct FrameCodec {
    body_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Byte offset of the `\r\n\r\n` terminator, if present.
fn header_end(src: &[u8]) -> Option<usize> {
    src.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Extract the Content-Length value from a header block. Other headers are
/// tolerated and ignored.
fn parse_content_length(header: &[u8]) -> io::Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|_| invalid_data("header block is not valid UTF-8"))?;

    for line in text.split("\r\n") {
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            return value
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid_data(format!("invalid Content-Length value {:?}", value.trim())));
        }
    }

    Err(invalid_data("header block missing Content-Length"))
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, io::Error> {
        loop {
            if let Some(len) = self.body_len {
                if src.len() < len {
                    src.reserve(len - src.len());
                    return Ok(None);
                }

                let body = src.split_to(len);
                self.body_len = None;

                let msg = serde_json::from_slice(&body)
                    .map_err(|e| invalid_data(format!("body is not a JSON-RPC message: {e}")))?;
                tracing::trace!(body_bytes = len, "Decoded frame");
                return Ok(Some(msg));
            }

            let Some(end) = header_end(src) else {
                return Ok(None);
            };

            let header = src.split_to(end + 4);
            let len = parse_content_length(&header[..end])?;
            if len > MAX_FRAME_LEN {
                return Err(invalid_data(format!(
                    "declared Content-Length {len} exceeds {MAX_FRAME_LEN}"
                )));
            }
            self.body_len = Some(len);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, io::Error> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None if src.is_empty() && self.body_len.is_none() => Ok(None),
            // Stream closed inside a header block or short of the declared
            // body length: a framing violation, not a clean close.
            None => Err(invalid_data("stream ended mid-frame")),
        }
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), io::Error> {
        let body = serde_json::to_vec(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        tracing::trace!(body_bytes = body.len(), "Encoding frame");

        dst.reserve(header.len() + body.len());
        dst.extend_from_slice(header.as_bytes());
        dst.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::RequestId;
    use serde_json::json;

    fn encode_bytes(msg: Message) -> BytesMut {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn header_declares_exact_body_length() {
        let buf = encode_bytes(Message::notification("initialized", None));
        let text = String::from_utf8(buf.to_vec()).unwrap();
        let (header, body) = text.split_once("\r\n\r\n").unwrap();
        let declared: usize = header.strip_prefix("Content-Length: ").unwrap().parse().unwrap();
        assert_eq!(declared, body.len());
    }

    #[test]
    fn round_trips_each_message_shape() {
        let messages = vec![
            Message::request(1, "initialize", Some(json!({"processId": 42}))),
            Message::notification("exit", None),
            Message::method_not_found(RequestId::Number(9), "window/showMessageRequest"),
        ];

        for msg in messages {
            let mut codec = FrameCodec::new();
            let mut buf = encode_bytes(msg.clone());
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, msg);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn extra_headers_are_ignored() {
        let body = r#"{"jsonrpc":"2.0","method":"initialized"}"#;
        let raw = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(raw.as_bytes());
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::notification("initialized", None));
    }

    #[test]
    fn missing_content_length_is_an_error() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Content-Type: text/plain\r\n\r\n{}"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn malformed_json_body_is_an_error() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 8\r\n\r\nnot json"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn partial_delivery_waits_for_more_bytes() {
        let full = encode_bytes(Message::request(5, "echo", Some(json!({"k": "v"}))));
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // Header split mid-line, then body split mid-frame.
        for chunk in full.chunks(7) {
            buf.extend_from_slice(chunk);
            if buf.len() < full.len() {
                // May or may not complete depending on chunk boundary; never errors.
                if let Some(msg) = codec.decode(&mut buf).unwrap() {
                    assert_eq!(msg, Message::request(5, "echo", Some(json!({"k": "v"}))));
                    return;
                }
            }
        }

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::request(5, "echo", Some(json!({"k": "v"}))));
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_bytes(Message::request(1, "a", None)));
        buf.extend_from_slice(&encode_bytes(Message::request(2, "b", None)));

        let mut codec = FrameCodec::new();
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Message::request(1, "a", None));
        assert_eq!(second, Message::request(2, "b", None));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn truncated_stream_is_detected_at_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 50\r\n\r\n{\"jsonrpc\""[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        // FramedRead calls decode_eof once the stream closes; leftover bytes
        // with no complete frame must fail as a framing violation.
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn clean_eof_between_frames_is_not_an_error() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_bytes(Message::notification("exit", None));
        assert!(codec.decode_eof(&mut buf).unwrap().is_some());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 999999999999\r\n\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
