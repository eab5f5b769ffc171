//! Connection lifecycle state machine.
//!
//! ```text
//! Uninitialized -> Starting -> Handshaking -> Ready -> ShuttingDown -> Terminated
//! ```
//! Every state may also jump straight to `Terminated` when process death is
//! observed; the client is responsible for failing pending calls when that
//! happens.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No process has been spawned yet.
    #[default]
    Uninitialized,
    /// Process spawned, grace-period poll in progress.
    Starting,
    /// Process alive, `initialize` exchange in flight.
    Handshaking,
    /// Handshake complete; regular calls are accepted.
    Ready,
    /// `shutdown`/`exit` sequence in progress.
    ShuttingDown,
    /// Terminal. All future calls fail.
    Terminated,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single authoritative state instance, mutated only under its own lock.
///
/// The lock is held for the compare-and-set only, never across I/O.
#[derive(Debug, Default)]
pub struct StateCell {
    inner: Mutex<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ConnectionState {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Perform `from -> to`, failing if the current state is not `from`.
    /// Returns the state that was actually observed.
    pub fn transition(
        &self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), ConnectionState> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if *state == from {
            tracing::debug!(from = %from, to = %to, "Connection state transition");
            *state = to;
            Ok(())
        } else {
            Err(*state)
        }
    }

    /// Unconditional jump to `Terminated`. Returns false if the connection
    /// was already terminated, so teardown runs exactly once.
    pub fn terminate(&self) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ConnectionState::Terminated {
            false
        } else {
            tracing::debug!(from = %*state, "Connection terminated");
            *state = ConnectionState::Terminated;
            true
        }
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_uninitialized() {
        assert_eq!(StateCell::new().get(), ConnectionState::Uninitialized);
    }

    #[test]
    fn happy_path_transitions() {
        use ConnectionState::*;
        let cell = StateCell::new();
        cell.transition(Uninitialized, Starting).unwrap();
        cell.transition(Starting, Handshaking).unwrap();
        cell.transition(Handshaking, Ready).unwrap();
        assert!(cell.is_ready());
        cell.transition(Ready, ShuttingDown).unwrap();
        assert!(cell.terminate());
        assert_eq!(cell.get(), ConnectionState::Terminated);
    }

    #[test]
    fn stale_transition_reports_observed_state() {
        use ConnectionState::*;
        let cell = StateCell::new();
        cell.transition(Uninitialized, Starting).unwrap();
        let observed = cell.transition(Uninitialized, Starting).unwrap_err();
        assert_eq!(observed, Starting);
    }

    #[test]
    fn terminate_runs_once() {
        let cell = StateCell::new();
        assert!(cell.terminate());
        assert!(!cell.terminate());
    }

    #[test]
    fn any_state_may_terminate() {
        use ConnectionState::*;
        for setup in [Uninitialized, Starting, Handshaking, Ready, ShuttingDown] {
            let cell = StateCell::new();
            if setup != Uninitialized {
                let mut prev = Uninitialized;
                for next in [Starting, Handshaking, Ready, ShuttingDown] {
                    cell.transition(prev, next).unwrap();
                    prev = next;
                    if next == setup {
                        break;
                    }
                }
            }
            assert!(cell.terminate());
        }
    }
}
