//! Client-facing error taxonomy.
//!
//! One enum covers both engines; every error from `connect` or `execute`
//! surfaces to the caller through it, with no silent retry. Inbound parse
//! failures never appear here — bad frames and checksum mismatches are
//! dropped at the codec boundary, since lossy and shared transports produce
//! them in normal operation.
//!
//! `ProtocolError` from `rcon-proto` converts at the crate boundary into
//! [`RconError::InvalidPacket`]; internally each layer keeps its own type.

use std::time::Duration;

use thiserror::Error;

use crate::session::ConnectionState;

/// Errors surfaced by `connect` and `execute`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RconError {
    /// Transport refused, reset, or closed before or during use.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected the credentials. Never retried internally:
    /// repeated attempts risk server-imposed IP bans.
    #[error("authentication rejected by server")]
    AuthFailed,

    /// A configured timer elapsed.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which timer fired (`"connect"`, `"authentication"`, `"command"`,
        /// `"socket inactivity"`).
        operation: &'static str,
        /// The configured duration that elapsed.
        after: Duration,
    },

    /// The transport surfaced an error after the session became active.
    #[error("socket error: {0}")]
    SocketError(String),

    /// An outbound packet violates size or shape invariants.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// `execute` was called outside the `Authenticated` state. The
    /// transport is never touched in this case.
    #[error("cannot execute command in state {state}")]
    NotAuthenticated {
        /// State the client was in.
        state: ConnectionState,
    },

    /// A failure that surfaced from within `execute`, wrapping the cause.
    #[error("command failed: {0}")]
    CommandFailed(#[source] Box<RconError>),
}

impl RconError {
    /// Wrap as a failure inside `execute`, preserving the underlying error.
    #[must_use]
    pub fn into_command_failure(self) -> Self {
        Self::CommandFailed(Box::new(self))
    }

    /// The underlying error when wrapped by [`RconError::CommandFailed`],
    /// otherwise the error itself.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::CommandFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl From<rcon_proto::ProtocolError> for RconError {
    fn from(err: rcon_proto::ProtocolError) -> Self {
        Self::InvalidPacket(err.to_string())
    }
}
