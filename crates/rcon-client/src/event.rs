//! Client events and the subscriber registry.

use std::sync::{Mutex, PoisonError};

use rcon_core::{ConnectionState, RconError};
use tokio::sync::mpsc;

/// Notifications delivered to event subscribers.
///
/// Both engines emit the same set; [`ClientEvent::ServerMessage`] is
/// BattlEye-only (Source RCON has no server push).
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session moved between lifecycle states.
    StateChange {
        /// State after the transition.
        new: ConnectionState,
        /// State before the transition.
        old: ConnectionState,
    },
    /// The authentication handshake succeeded.
    Authenticated,
    /// The session finished tearing down.
    Disconnected,
    /// The transport closed.
    Close {
        /// Whether a fault caused the close.
        had_error: bool,
    },
    /// An asynchronous fault (socket error after the session became active).
    Error(RconError),
    /// Server-pushed message, already acknowledged on the wire.
    ServerMessage(String),
}

/// Registry of event subscribers.
///
/// Each subscriber owns an unbounded receiver; senders whose receiver was
/// dropped are pruned on the next emit. Unbounded is safe here: events are
/// produced at protocol pace, orders of magnitude below channel capacity
/// concerns.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>,
}

impl EventBus {
    /// Register a new subscriber.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
