//! Pending-call table: id allocation, response routing, and bulk failure.
//!
//! Each in-flight call is a oneshot sender keyed by its request id. Removal
//! from the table happens before the reply is sent, so every call resolves at
//! most once and a late response for a departed id is dropped silently.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

use super::error::BridgeError;

/// What a pending call eventually receives: the server's `result` payload or
/// a per-call failure.
pub type CallReply = Result<serde_json::Value, BridgeError>;

#[derive(Debug)]
pub struct RequestDispatcher {
    next_id: AtomicI64,
    pending: DashMap<i64, oneshot::Sender<CallReply>>,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate the next id and register a completion slot for it.
    /// Ids are strictly increasing and never reused while pending.
    pub fn register(&self) -> (i64, oneshot::Receiver<CallReply>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Route a reply to the caller waiting on `id`. Returns false when no
    /// entry exists — the call timed out or the connection closed, and the
    /// reply is dropped.
    pub fn resolve(&self, id: i64, reply: CallReply) -> bool {
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                if tx.send(reply).is_err() {
                    tracing::trace!(id, "Caller gone before resolution");
                }
                true
            }
            None => {
                tracing::trace!(id, "Dropping reply for unknown or timed-out request");
                false
            }
        }
    }

    /// Remove an entry without resolving it (timeout path). The caller has
    /// already given up; a later response for this id becomes a no-op.
    pub fn discard(&self, id: i64) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Fail every pending call with the same error (connection-closed path).
    /// Returns how many calls were failed.
    pub fn fail_all(&self, error: &BridgeError) -> usize {
        let ids: Vec<i64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(error.clone()));
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::debug!(failed, error = %error, "Failed all pending calls");
        }
        failed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_start_at_one_and_increase() {
        let dispatcher = RequestDispatcher::new();
        let (a, _rx_a) = dispatcher.register();
        let (b, _rx_b) = dispatcher.register();
        let (c, _rx_c) = dispatcher.register();
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[tokio::test]
    async fn reply_reaches_only_its_own_caller() {
        let dispatcher = RequestDispatcher::new();
        let (id_a, rx_a) = dispatcher.register();
        let (id_b, rx_b) = dispatcher.register();

        assert!(dispatcher.resolve(id_b, Ok(json!("b"))));
        assert!(dispatcher.resolve(id_a, Ok(json!("a"))));

        assert_eq!(rx_a.await.unwrap().unwrap(), json!("a"));
        assert_eq!(rx_b.await.unwrap().unwrap(), json!("b"));
    }

    #[test]
    fn late_reply_after_discard_is_dropped() {
        let dispatcher = RequestDispatcher::new();
        let (id, rx) = dispatcher.register();

        assert!(dispatcher.discard(id));
        assert!(!dispatcher.resolve(id, Ok(json!(1))));
        drop(rx);

        // A second discard is also a no-op.
        assert!(!dispatcher.discard(id));
    }

    #[tokio::test]
    async fn fail_all_drains_every_pending_call() {
        let dispatcher = RequestDispatcher::new();
        let receivers: Vec<_> = (0..3).map(|_| dispatcher.register().1).collect();

        assert_eq!(dispatcher.fail_all(&BridgeError::ConnectionClosed), 3);
        assert_eq!(dispatcher.pending_len(), 0);

        for rx in receivers {
            match rx.await.unwrap() {
                Err(BridgeError::ConnectionClosed) => {}
                other => panic!("expected ConnectionClosed, got {other:?}"),
            }
        }
    }

    #[test]
    fn concurrent_registration_yields_unique_ids() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let dispatcher = Arc::new(RequestDispatcher::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let d = Arc::clone(&dispatcher);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| d.register().0).collect::<Vec<i64>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} allocated twice");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
