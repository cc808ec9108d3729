//! Connection lifecycle state machine.

use tokio::sync::watch;

/// WebSocket connection state.
///
/// States progress strictly forward: `Connecting -> Open -> Closing -> Closed`,
/// with `Closed` reachable from any state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionState {
    /// Connection has not yet been established.
    #[default]
    Connecting,
    /// Connection is open and ready for data transfer.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Connection is closed or could not be opened.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is in an active state.
    ///
    /// Returns `true` for `Connecting`, `Open`, or `Closing` states.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if a transition from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Open, ConnectionState::Closing)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closed)
                | (ConnectionState::Closing, ConnectionState::Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Shared, observable connection state.
///
/// Transitions are compare-and-set so that concurrent paths (local close,
/// peer close, receive fault) race safely and exactly one of them wins.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Connecting);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Move to `next` only if the current state is `expected`.
    pub(crate) fn compare_and_set(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == expected && state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Closed` from any other state, returning the previous state.
    ///
    /// Returns `None` if the state was already `Closed`.
    pub(crate) fn close(&self) -> Option<ConnectionState> {
        let mut previous = None;
        self.tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                previous = Some(*state);
                *state = ConnectionState::Closed;
                true
            }
        });
        previous
    }

    /// Wait until the state reaches `Closed`.
    pub(crate) async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }
}
