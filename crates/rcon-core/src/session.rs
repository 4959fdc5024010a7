//! Connection lifecycle state machine.
//!
//! A tiny finite automaton shared by both protocol engines. It owns the
//! current state, validates that transitions follow the one-way lifecycle,
//! and reports each completed transition as a [`StateChange`] for the
//! engine to broadcast. Effects — socket teardown, event emission — are the
//! engine's job; the machine itself is pure.
//!
//! ```text
//! Disconnected ─> Connecting ─> Connected ─> Authenticating ─> Authenticated
//!       ^              │            │              │                  │
//!       │              └────────────┴──────┬───────┴──────────────────┘
//!       │                                  v
//!       └──────────────────────────────  Error
//! ```
//!
//! Every state may tear down to `Disconnected`; `Error` has no other exit.

use std::fmt;

use thiserror::Error;

/// Lifecycle states of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, and terminal again after teardown.
    Disconnected,
    /// Transport connection attempt in progress.
    Connecting,
    /// Transport established, handshake not yet started.
    Connected,
    /// Authentication handshake in flight.
    Authenticating,
    /// Handshake accepted; `execute` is available.
    Authenticated,
    /// Fatal fault; only teardown to `Disconnected` leaves this state.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A completed transition, in `(new, old)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State after the transition.
    pub new: ConnectionState,
    /// State before the transition.
    pub old: ConnectionState,
}

/// Attempted transition off the legal lifecycle path.
///
/// This is a programmer error in the engine, not a runtime protocol event;
/// the machine is left unchanged when it is reported.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal state transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// State the machine was in.
    pub from: ConnectionState,
    /// State that was requested.
    pub to: ConnectionState,
}

/// The session automaton.
#[derive(Debug, Clone)]
pub struct Session {
    state: ConnectionState,
}

impl Session {
    /// Create a session in [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        Self { state: ConnectionState::Disconnected }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether `execute` is currently admissible.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// Whether `from -> to` lies on the lifecycle path.
    fn is_legal(from: ConnectionState, to: ConnectionState) -> bool {
        use ConnectionState as S;
        matches!(
            (from, to),
            // Teardown is legal from everywhere, repeated teardown included.
            (_, S::Disconnected)
                | (S::Disconnected, S::Connecting)
                | (S::Connecting, S::Connected)
                | (S::Connected, S::Authenticating)
                | (S::Authenticating, S::Authenticated)
                // Any live state may fault.
                | (S::Connecting | S::Connected | S::Authenticating | S::Authenticated, S::Error)
        )
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// [`IllegalTransition`] when `next` is not reachable from the current
    /// state; the machine is left unchanged.
    pub fn transition(&mut self, next: ConnectionState) -> Result<StateChange, IllegalTransition> {
        if !Self::is_legal(self.state, next) {
            return Err(IllegalTransition { from: self.state, to: next });
        }
        let old = std::mem::replace(&mut self.state, next);
        Ok(StateChange { new: next, old })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
